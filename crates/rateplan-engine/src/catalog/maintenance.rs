//! Train fleet maintenance: plans made of periodic and mileage-based tasks,
//! and the cost of the work done on each train.

use crate::aggregator::ranking::top_n_by;
use crate::config::MaintenanceConfig;
use crate::error::{LedgerError, Result};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rateplan_common::Amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

crate::uuid_id!(TrainId);
crate::uuid_id!(PlanId);
crate::uuid_id!(TaskId);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskCadence {
    Periodic { every_days: u32 },
    /// Final cost grows with the kilometres the train has travelled.
    Mileage { every_km: Decimal },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub name: String,
    pub price: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceTask {
    pub id: TaskId,
    pub code: String,
    pub estimated_minutes: u32,
    pub base_price: Amount,
    pub parts: Vec<Part>,
    pub cadence: TaskCadence,
}

impl MaintenanceTask {
    pub fn base_cost(&self) -> Amount {
        self.parts
            .iter()
            .fold(self.base_price, |total, part| total.add(part.price))
    }

    pub fn final_cost(&self, total_km: Decimal, config: &MaintenanceConfig) -> Amount {
        match self.cadence {
            TaskCadence::Periodic { .. } => self.base_cost(),
            TaskCadence::Mileage { .. } => self
                .base_cost()
                .add(Amount::from_decimal(config.mileage_rate * total_km)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenancePlan {
    pub id: PlanId,
    pub version: String,
    pub models: Vec<String>,
    pub tasks: Vec<MaintenanceTask>,
}

impl MaintenancePlan {
    pub fn base_cost(&self) -> Amount {
        self.tasks.iter().map(MaintenanceTask::base_cost).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub at: NaiveDateTime,
    pub km: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedTask {
    pub task_id: TaskId,
    pub on: NaiveDate,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Train {
    pub id: TrainId,
    pub serial_number: String,
    pub model: String,
    pub brand: String,
    pub commissioned_on: NaiveDate,
    pub initial_km: Decimal,
    pub total_km: Decimal,
    pub trips: Vec<Trip>,
    pub completed: Vec<CompletedTask>,
}

#[derive(Debug, Default)]
pub struct MaintenanceShop {
    config: MaintenanceConfig,
    /// Model name to the plan it follows, if any
    models: HashMap<String, Option<PlanId>>,
    plans: HashMap<PlanId, MaintenancePlan>,
    plan_order: Vec<PlanId>,
    task_index: HashMap<TaskId, PlanId>,
    trains: HashMap<TrainId, Train>,
}

impl MaintenanceShop {
    /// Fails with a config error when `config` does not validate.
    pub fn new(config: MaintenanceConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Default::default()
        })
    }

    pub fn register_model(&mut self, name: impl Into<String>) {
        self.models.entry(name.into()).or_insert(None);
    }

    pub fn register_plan(&mut self, version: impl Into<String>) -> PlanId {
        let plan = MaintenancePlan {
            id: PlanId::new(),
            version: version.into(),
            models: Vec::new(),
            tasks: Vec::new(),
        };
        let id = plan.id;
        self.plans.insert(id, plan);
        self.plan_order.push(id);
        id
    }

    pub fn plan(&self, plan_id: &PlanId) -> Result<&MaintenancePlan> {
        self.plans.get(plan_id).ok_or_else(|| LedgerError::PlanNotFound {
            id: plan_id.to_string(),
        })
    }

    fn plan_mut(&mut self, plan_id: &PlanId) -> Result<&mut MaintenancePlan> {
        self.plans
            .get_mut(plan_id)
            .ok_or_else(|| LedgerError::PlanNotFound {
                id: plan_id.to_string(),
            })
    }

    /// Make `model` follow `plan_id`, replacing any previous plan.
    pub fn assign_plan(&mut self, model: &str, plan_id: &PlanId) -> Result<()> {
        self.plan(plan_id)?;
        let assigned = self
            .models
            .get_mut(model)
            .ok_or_else(|| LedgerError::ModelNotFound {
                name: model.to_string(),
            })?;
        let previous = assigned.replace(*plan_id);

        if let Some(previous) = previous {
            if let Some(old) = self.plans.get_mut(&previous) {
                old.models.retain(|m| m != model);
            }
        }
        self.plan_mut(plan_id)?.models.push(model.to_string());
        Ok(())
    }

    pub fn plan_for_model(&self, model: &str) -> Result<Option<&MaintenancePlan>> {
        let assigned = self
            .models
            .get(model)
            .ok_or_else(|| LedgerError::ModelNotFound {
                name: model.to_string(),
            })?;
        Ok(assigned.and_then(|plan_id| self.plans.get(&plan_id)))
    }

    pub fn add_task(
        &mut self,
        plan_id: &PlanId,
        code: impl Into<String>,
        estimated_minutes: u32,
        base_price: Amount,
        parts: Vec<Part>,
        cadence: TaskCadence,
    ) -> Result<TaskId> {
        let task = MaintenanceTask {
            id: TaskId::new(),
            code: code.into(),
            estimated_minutes,
            base_price,
            parts,
            cadence,
        };
        let id = task.id;
        self.plan_mut(plan_id)?.tasks.push(task);
        self.task_index.insert(id, *plan_id);
        Ok(id)
    }

    pub fn task(&self, task_id: &TaskId) -> Result<&MaintenanceTask> {
        let not_found = || LedgerError::TaskNotFound {
            id: task_id.to_string(),
        };
        let plan_id = self.task_index.get(task_id).ok_or_else(not_found)?;
        self.plan(plan_id)?
            .tasks
            .iter()
            .find(|task| task.id == *task_id)
            .ok_or_else(not_found)
    }

    pub fn register_train(
        &mut self,
        serial_number: impl Into<String>,
        model: &str,
        brand: impl Into<String>,
        commissioned_on: NaiveDate,
        initial_km: Decimal,
    ) -> Result<TrainId> {
        if !self.models.contains_key(model) {
            return Err(LedgerError::ModelNotFound {
                name: model.to_string(),
            });
        }

        let train = Train {
            id: TrainId::new(),
            serial_number: serial_number.into(),
            model: model.to_string(),
            brand: brand.into(),
            commissioned_on,
            initial_km,
            total_km: initial_km,
            trips: Vec::new(),
            completed: Vec::new(),
        };
        let id = train.id;
        self.trains.insert(id, train);
        Ok(id)
    }

    pub fn train(&self, train_id: &TrainId) -> Result<&Train> {
        self.trains
            .get(train_id)
            .ok_or_else(|| LedgerError::TrainNotFound {
                id: train_id.to_string(),
            })
    }

    fn train_mut(&mut self, train_id: &TrainId) -> Result<&mut Train> {
        self.trains
            .get_mut(train_id)
            .ok_or_else(|| LedgerError::TrainNotFound {
                id: train_id.to_string(),
            })
    }

    pub fn record_trip(
        &mut self,
        train_id: &TrainId,
        at: NaiveDateTime,
        km: Decimal,
    ) -> Result<()> {
        let train = self.train_mut(train_id)?;
        train.trips.push(Trip { at, km });
        train.total_km += km;
        debug!("Train {} now at {} km", train.serial_number, train.total_km);
        Ok(())
    }

    pub fn complete_task(
        &mut self,
        train_id: &TrainId,
        task_id: &TaskId,
        on: NaiveDate,
        description: impl Into<String>,
    ) -> Result<()> {
        self.task(task_id)?;
        self.train_mut(train_id)?.completed.push(CompletedTask {
            task_id: *task_id,
            on,
            description: description.into(),
        });
        Ok(())
    }

    /// Cost of the tasks completed on a train during one calendar month,
    /// with mileage tasks priced at the train's current total.
    pub fn monthly_cost(&self, train_id: &TrainId, year: i32, month: u32) -> Result<Amount> {
        let train = self.train(train_id)?;
        train
            .completed
            .iter()
            .filter(|done| done.on.year() == year && done.on.month() == month)
            .map(|done| {
                self.task(&done.task_id)
                    .map(|task| task.final_cost(train.total_km, &self.config))
            })
            .sum()
    }

    /// Plans with the highest summed task base cost first.
    pub fn costliest_plans(&self, n: usize) -> Vec<(&MaintenancePlan, Amount)> {
        let plans = self
            .plan_order
            .iter()
            .filter_map(|id| self.plans.get(id))
            .map(|plan| (plan, plan.base_cost()));
        top_n_by(plans, n, |(_, cost)| *cost)
    }

    /// [`costliest_plans`](Self::costliest_plans) with the configured listing length.
    pub fn costliest_plans_default(&self) -> Vec<(&MaintenancePlan, Amount)> {
        self.costliest_plans(self.config.top_plans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn part(name: &str, price: u32) -> Part {
        Part {
            name: name.to_string(),
            price: Amount::from(price),
        }
    }

    fn february(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 2, day).unwrap()
    }

    #[test]
    fn test_monthly_cost_uses_total_km() {
        let mut shop = MaintenanceShop::new(MaintenanceConfig::default()).unwrap();
        shop.register_model("Model A");
        let plan = shop.register_plan("V1.0");
        shop.assign_plan("Model A", &plan).unwrap();

        let filter = shop
            .add_task(
                &plan,
                "TP-001",
                120,
                Amount::from(200u32),
                vec![part("Air filter", 50)],
                TaskCadence::Periodic { every_days: 30 },
            )
            .unwrap();
        let oil = shop
            .add_task(
                &plan,
                "TR-001",
                180,
                Amount::from(150u32),
                vec![part("Lubricant", 30)],
                TaskCadence::Mileage { every_km: dec!(10000) },
            )
            .unwrap();

        let built = NaiveDate::from_ymd_opt(2022, 5, 10).unwrap();
        let train = shop
            .register_train("12345A", "Model A", "MarcaX", built, dec!(5000))
            .unwrap();
        shop.record_trip(&train, february(10).and_hms_opt(10, 0, 0).unwrap(), dec!(1200))
            .unwrap();
        shop.record_trip(&train, february(15).and_hms_opt(14, 30, 0).unwrap(), dec!(800))
            .unwrap();
        shop.complete_task(&train, &filter, february(28), "Air filter swap").unwrap();
        shop.complete_task(&train, &oil, february(28), "Oil change").unwrap();

        assert_eq!(shop.train(&train).unwrap().total_km, dec!(7000));
        // 250 + (180 + 0.05 * 7000)
        assert_eq!(shop.monthly_cost(&train, 2024, 2).unwrap().as_decimal(), dec!(780));
        assert_eq!(shop.monthly_cost(&train, 2024, 3).unwrap(), Amount::zero());
    }

    #[test]
    fn test_costliest_plans() {
        let mut shop = MaintenanceShop::new(MaintenanceConfig::default()).unwrap();
        let cheap = shop.register_plan("V1");
        let empty = shop.register_plan("V2");
        let pricey = shop.register_plan("V3");
        let weekly = TaskCadence::Periodic { every_days: 7 };
        shop.add_task(&cheap, "A", 10, Amount::from(100u32), vec![], weekly.clone())
            .unwrap();
        let brake = vec![part("Brake", 20)];
        shop.add_task(&pricey, "B", 10, Amount::from(300u32), brake, weekly)
            .unwrap();

        let ranked: Vec<(&str, Amount)> = shop
            .costliest_plans(2)
            .into_iter()
            .map(|(plan, cost)| (plan.version.as_str(), cost))
            .collect();
        assert_eq!(ranked, vec![("V3", Amount::from(320u32)), ("V1", Amount::from(100u32))]);
        assert_eq!(shop.plan(&empty).unwrap().base_cost(), Amount::zero());
    }

    #[test]
    fn test_costliest_plans_default_uses_configured_length() {
        let config = MaintenanceConfig {
            top_plans: 1,
            ..Default::default()
        };
        let mut shop = MaintenanceShop::new(config).unwrap();
        let cadence = TaskCadence::Mileage { every_km: dec!(1000) };
        let low = shop.register_plan("V1");
        let high = shop.register_plan("V2");
        shop.add_task(&low, "A", 5, Amount::from(10u32), vec![], cadence.clone())
            .unwrap();
        shop.add_task(&high, "B", 5, Amount::from(90u32), vec![], cadence)
            .unwrap();

        let ranked = shop.costliest_plans_default();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].0.id, high);

        let negative = MaintenanceConfig {
            mileage_rate: dec!(-0.01),
            ..Default::default()
        };
        assert!(MaintenanceShop::new(negative).is_err());
    }

    #[test]
    fn test_unknown_references() {
        let mut shop = MaintenanceShop::new(MaintenanceConfig::default()).unwrap();
        let err = shop
            .register_train("X", "Ghost", "-", february(1), Decimal::ZERO)
            .unwrap_err();
        assert!(matches!(err, LedgerError::ModelNotFound { .. }));

        shop.register_model("Model B");
        let train = shop
            .register_train("Y", "Model B", "-", february(1), Decimal::ZERO)
            .unwrap();
        let err = shop
            .complete_task(&train, &TaskId::new(), february(2), "-")
            .unwrap_err();
        assert!(matches!(err, LedgerError::TaskNotFound { .. }));
        assert!(shop.train(&train).unwrap().completed.is_empty());
        assert!(shop.plan_for_model("Model B").unwrap().is_none());
    }

    #[test]
    fn test_reassigning_a_plan_moves_the_model() {
        let mut shop = MaintenanceShop::new(MaintenanceConfig::default()).unwrap();
        shop.register_model("Model A");
        let v1 = shop.register_plan("V1");
        let v2 = shop.register_plan("V2");

        shop.assign_plan("Model A", &v1).unwrap();
        shop.assign_plan("Model A", &v2).unwrap();

        assert!(shop.plan(&v1).unwrap().models.is_empty());
        assert_eq!(shop.plan(&v2).unwrap().models, vec!["Model A".to_string()]);
        assert_eq!(shop.plan_for_model("Model A").unwrap().unwrap().id, v2);
    }
}
