//! Freelance marketplace: clients post projects, freelancers bid, and the
//! cheapest bid per delivery day is recommended first.

use crate::config::BiddingConfig;
use crate::error::{LedgerError, Result};
use chrono::NaiveDate;
use rateplan_common::Amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

crate::uuid_id!(ClientId);
crate::uuid_id!(FreelancerId);
crate::uuid_id!(ProjectId);
crate::uuid_id!(BidId);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BidTerms {
    /// Billed at the freelancer's hourly rate, delivered on a fixed date.
    Hourly { hours: u32, delivery_on: NaiveDate },
    /// A salaried position for a number of months.
    Position {
        monthly_salary: Amount,
        hours_per_month: u32,
        months: u32,
    },
}

/// Price per delivery day. Bids that would be delivered on or before the
/// reference date cannot be compared and rank last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum BidScore {
    Finite(Decimal),
    Unbounded,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: ClientId,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Freelancer {
    pub id: FreelancerId,
    pub name: String,
    pub email: String,
    pub hourly_rate: Amount,
    pub categories: Vec<String>,
    pub points: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub freelancer_id: FreelancerId,
    pub placed_on: NaiveDate,
    pub terms: BidTerms,
}

impl Bid {
    pub fn price(&self, hourly_rate: Amount) -> Amount {
        match &self.terms {
            BidTerms::Hourly { hours, .. } => hourly_rate.multiply(Decimal::from(*hours)),
            BidTerms::Position {
                monthly_salary,
                months,
                ..
            } => monthly_salary.multiply(Decimal::from(*months)),
        }
    }

    pub fn delivery_days(&self, reference: NaiveDate, days_per_month: i64) -> i64 {
        match &self.terms {
            BidTerms::Hourly { delivery_on, .. } => (*delivery_on - reference).num_days(),
            BidTerms::Position { months, .. } => i64::from(*months) * days_per_month,
        }
    }

    pub fn score(
        &self,
        hourly_rate: Amount,
        reference: NaiveDate,
        days_per_month: i64,
    ) -> BidScore {
        let days = self.delivery_days(reference, days_per_month);
        if days <= 0 {
            return BidScore::Unbounded;
        }
        BidScore::Finite(self.price(hourly_rate).as_decimal() / Decimal::from(days))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub client_id: ClientId,
    pub name: String,
    pub description: String,
    pub bid_deadline: NaiveDate,
    pub categories: Vec<String>,
    pub bids: Vec<Bid>,
    pub awarded: Option<BidId>,
    pub completed_on: Option<NaiveDate>,
}

impl Project {
    pub fn is_completed(&self) -> bool {
        self.completed_on.is_some()
    }

    fn bid(&self, bid_id: &BidId) -> Option<&Bid> {
        self.bids.iter().find(|bid| bid.id == *bid_id)
    }
}

#[derive(Debug, Default)]
pub struct Marketplace {
    config: BiddingConfig,
    clients: HashMap<ClientId, Client>,
    freelancers: HashMap<FreelancerId, Freelancer>,
    freelancer_order: Vec<FreelancerId>,
    projects: HashMap<ProjectId, Project>,
    project_order: Vec<ProjectId>,
}

impl Marketplace {
    /// Fails with a config error when `config` does not validate.
    pub fn new(config: BiddingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Default::default()
        })
    }

    pub fn register_client(
        &mut self,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> ClientId {
        let client = Client {
            id: ClientId::new(),
            name: name.into(),
            email: email.into(),
        };
        let id = client.id;
        self.clients.insert(id, client);
        id
    }

    pub fn register_freelancer(
        &mut self,
        name: impl Into<String>,
        email: impl Into<String>,
        hourly_rate: Amount,
        categories: Vec<String>,
    ) -> FreelancerId {
        let freelancer = Freelancer {
            id: FreelancerId::new(),
            name: name.into(),
            email: email.into(),
            hourly_rate,
            categories,
            points: 0,
        };
        let id = freelancer.id;
        self.freelancers.insert(id, freelancer);
        self.freelancer_order.push(id);
        id
    }

    /// Post a project on behalf of an existing client.
    pub fn register_project(
        &mut self,
        client_id: &ClientId,
        name: impl Into<String>,
        description: impl Into<String>,
        bid_deadline: NaiveDate,
        categories: Vec<String>,
    ) -> Result<ProjectId> {
        if !self.clients.contains_key(client_id) {
            return Err(LedgerError::ClientNotFound {
                id: client_id.to_string(),
            });
        }

        let project = Project {
            id: ProjectId::new(),
            client_id: *client_id,
            name: name.into(),
            description: description.into(),
            bid_deadline,
            categories,
            bids: Vec::new(),
            awarded: None,
            completed_on: None,
        };
        let id = project.id;
        self.projects.insert(id, project);
        self.project_order.push(id);
        Ok(id)
    }

    pub fn project(&self, project_id: &ProjectId) -> Result<&Project> {
        self.projects
            .get(project_id)
            .ok_or_else(|| LedgerError::ProjectNotFound {
                id: project_id.to_string(),
            })
    }

    fn project_mut(&mut self, project_id: &ProjectId) -> Result<&mut Project> {
        self.projects
            .get_mut(project_id)
            .ok_or_else(|| LedgerError::ProjectNotFound {
                id: project_id.to_string(),
            })
    }

    pub fn freelancer(&self, freelancer_id: &FreelancerId) -> Result<&Freelancer> {
        self.freelancers
            .get(freelancer_id)
            .ok_or_else(|| LedgerError::FreelancerNotFound {
                id: freelancer_id.to_string(),
            })
    }

    pub fn place_bid(
        &mut self,
        project_id: &ProjectId,
        freelancer_id: &FreelancerId,
        placed_on: NaiveDate,
        terms: BidTerms,
    ) -> Result<BidId> {
        self.freelancer(freelancer_id)?;
        let bid = Bid {
            id: BidId::new(),
            freelancer_id: *freelancer_id,
            placed_on,
            terms,
        };
        let id = bid.id;
        self.project_mut(project_id)?.bids.push(bid);
        Ok(id)
    }

    /// Bids ordered by ascending score against the project's bid deadline.
    /// Equal scores keep the order the bids were placed in.
    pub fn recommend_bids(&self, project_id: &ProjectId) -> Result<Vec<(&Bid, BidScore)>> {
        let project = self.project(project_id)?;
        let mut scored = project
            .bids
            .iter()
            .map(|bid| {
                let rate = self.freelancer(&bid.freelancer_id)?.hourly_rate;
                Ok((
                    bid,
                    bid.score(rate, project.bid_deadline, self.config.days_per_month),
                ))
            })
            .collect::<Result<Vec<_>>>()?;
        scored.sort_by_key(|(_, score)| *score);
        Ok(scored)
    }

    pub fn award_bid(&mut self, project_id: &ProjectId, bid_id: &BidId) -> Result<()> {
        let project = self.project_mut(project_id)?;
        if project.bid(bid_id).is_none() {
            return Err(LedgerError::BidNotOnProject {
                bid: bid_id.to_string(),
                project: project.name.clone(),
            });
        }
        project.awarded = Some(*bid_id);
        info!("Awarded bid {} on {}", bid_id, project.name);
        Ok(())
    }

    pub fn awarded_freelancer(&self, project_id: &ProjectId) -> Result<Option<&Freelancer>> {
        let project = self.project(project_id)?;
        match project.awarded.and_then(|bid_id| project.bid(&bid_id)) {
            Some(bid) => Ok(Some(self.freelancer(&bid.freelancer_id)?)),
            None => Ok(None),
        }
    }

    /// Close the project and credit `score` points to the awarded freelancer.
    pub fn complete_project(
        &mut self,
        project_id: &ProjectId,
        score: u32,
        on: NaiveDate,
    ) -> Result<()> {
        let (min, max) = (self.config.min_score, self.config.max_score);
        let project = self.project(project_id)?;
        if project.is_completed() {
            return Err(LedgerError::ProjectAlreadyCompleted {
                project: project.name.clone(),
            });
        }
        let freelancer_id = project
            .awarded
            .and_then(|bid_id| project.bid(&bid_id))
            .map(|bid| bid.freelancer_id)
            .ok_or_else(|| LedgerError::NoAwardedBid {
                project: project.name.clone(),
            })?;
        if !(min..=max).contains(&score) {
            return Err(LedgerError::ScoreOutOfRange { score, min, max });
        }

        let freelancer = self
            .freelancers
            .get_mut(&freelancer_id)
            .ok_or_else(|| LedgerError::FreelancerNotFound {
                id: freelancer_id.to_string(),
            })?;
        freelancer.points += score;
        info!("{} earned {} points", freelancer.name, score);
        self.project_mut(project_id)?.completed_on = Some(on);
        Ok(())
    }

    pub fn projects_in_category(&self, category: &str) -> Vec<&Project> {
        self.project_order
            .iter()
            .filter_map(|id| self.projects.get(id))
            .filter(|project| project.categories.iter().any(|c| c == category))
            .collect()
    }

    pub fn freelancers_in_category(&self, category: &str) -> Vec<&Freelancer> {
        self.freelancer_order
            .iter()
            .filter_map(|id| self.freelancers.get(id))
            .filter(|freelancer| freelancer.categories.iter().any(|c| c == category))
            .collect()
    }
}
