//! Bike share: docking stations, rider passes and per-ride fares.

use crate::config::PassTariffs;
use crate::error::{LedgerError, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rateplan_common::Amount;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{info, warn};

crate::uuid_id!(StationId);
crate::uuid_id!(BikeId);
crate::uuid_id!(RiderId);
crate::uuid_id!(RideId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnusableReason {
    Expired,
    InsufficientBalance,
    NoPass,
}

impl fmt::Display for UnusableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnusableReason::Expired => write!(f, "pass has expired"),
            UnusableReason::InsufficientBalance => write!(f, "insufficient balance"),
            UnusableReason::NoPass => write!(f, "rider has no pass"),
        }
    }
}

/// Price of a finished ride. A pass that cannot pay yields `Unusable`
/// instead of a price; the ride still ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Fare {
    Charged { amount: Amount },
    Unusable { reason: UnusableReason },
}

impl Fare {
    pub fn amount(&self) -> Option<Amount> {
        match self {
            Fare::Charged { amount } => Some(*amount),
            Fare::Unusable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Pass {
    Annual { starts_on: NaiveDate },
    /// Balance may go below zero when a ride costs more than what is left.
    Prepaid { balance: Decimal },
    Tourist { starts_on: NaiveDate },
}

impl Pass {
    pub fn check_valid(
        &self,
        on: NaiveDate,
        tariffs: &PassTariffs,
    ) -> std::result::Result<(), UnusableReason> {
        let valid = match self {
            Pass::Annual { starts_on } => {
                valid_through(*starts_on, tariffs.annual_validity_days, on)
            }
            Pass::Tourist { starts_on } => {
                valid_through(*starts_on, tariffs.tourist_validity_days, on)
            }
            Pass::Prepaid { balance } => {
                if *balance < tariffs.prepaid_minimum_balance.as_decimal() {
                    return Err(UnusableReason::InsufficientBalance);
                }
                true
            }
        };
        if valid {
            Ok(())
        } else {
            Err(UnusableReason::Expired)
        }
    }

    /// Price a ride of length `elapsed` taken on `on`. Prepaid passes pay
    /// from their balance.
    pub fn charge(&mut self, elapsed: Duration, on: NaiveDate, tariffs: &PassTariffs) -> Fare {
        if let Err(reason) = self.check_valid(on, tariffs) {
            return Fare::Unusable { reason };
        }

        let amount = match self {
            Pass::Annual { .. } => blocks(
                elapsed,
                tariffs.annual_free_minutes,
                tariffs.annual_block_minutes,
                tariffs.annual_block_price,
            ),
            Pass::Tourist { .. } => blocks(
                elapsed,
                tariffs.tourist_free_minutes,
                tariffs.tourist_block_minutes,
                tariffs.tourist_block_price,
            ),
            Pass::Prepaid { balance } => {
                let amount = blocks(
                    elapsed,
                    0,
                    tariffs.prepaid_block_minutes,
                    tariffs.prepaid_block_price,
                );
                *balance = balance.saturating_sub(amount.as_decimal());
                amount
            }
        };
        Fare::Charged { amount }
    }
}

/// A pass whose last valid day lies past the calendar never expires.
fn valid_through(starts_on: NaiveDate, validity_days: i64, on: NaiveDate) -> bool {
    Duration::try_days(validity_days)
        .and_then(|validity| starts_on.checked_add_signed(validity))
        .map_or(true, |last_day| on <= last_day)
}

/// Every started block past the free minutes is billed, plus one.
fn blocks(
    elapsed: Duration,
    free_minutes: i64,
    block_minutes: i64,
    block_price: Amount,
) -> Amount {
    let billable = (elapsed.num_seconds() - free_minutes * 60).max(0);
    let count = billable / (block_minutes * 60) + 1;
    block_price.multiply(Decimal::from(count))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Station {
    pub id: StationId,
    pub location: String,
    pub capacity: usize,
    pub bikes: Vec<BikeId>,
}

impl Station {
    pub fn has_bikes(&self) -> bool {
        !self.bikes.is_empty()
    }

    pub fn has_free_dock(&self) -> bool {
        self.bikes.len() < self.capacity
    }

    pub fn is_docked(&self, bike_id: &BikeId) -> bool {
        self.bikes.contains(bike_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bike {
    pub id: BikeId,
    pub label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rider {
    pub id: RiderId,
    pub name: String,
    pub card_number: String,
    pub pass: Option<Pass>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub card_number: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ride {
    pub id: RideId,
    pub rider_id: RiderId,
    pub bike_id: BikeId,
    pub from_station: StationId,
    pub started_at: NaiveDateTime,
    pub to_station: Option<StationId>,
    pub returned_at: Option<NaiveDateTime>,
    pub fare: Option<Fare>,
    pub payment: Option<Payment>,
}

impl Ride {
    pub fn in_progress(&self) -> bool {
        self.returned_at.is_none()
    }

    pub fn elapsed(&self) -> Duration {
        self.returned_at
            .map(|returned| returned - self.started_at)
            .unwrap_or_else(Duration::zero)
    }
}

#[derive(Debug, Default)]
pub struct BikeShare {
    tariffs: PassTariffs,
    stations: HashMap<StationId, Station>,
    station_order: Vec<StationId>,
    bikes: HashMap<BikeId, Bike>,
    riders: HashMap<RiderId, Rider>,
    rides: Vec<Ride>,
}

impl BikeShare {
    /// Fails with a config error when `tariffs` do not validate.
    pub fn new(tariffs: PassTariffs) -> Result<Self> {
        tariffs.validate()?;
        Ok(Self {
            tariffs,
            ..Default::default()
        })
    }

    pub fn register_station(&mut self, location: impl Into<String>, capacity: usize) -> StationId {
        let station = Station {
            id: StationId::new(),
            location: location.into(),
            capacity,
            bikes: Vec::new(),
        };
        let id = station.id;
        self.stations.insert(id, station);
        self.station_order.push(id);
        id
    }

    /// Put a new bike into service at `station_id`.
    pub fn register_bike(
        &mut self,
        station_id: &StationId,
        label: impl Into<String>,
    ) -> Result<BikeId> {
        let station = self.station_mut(station_id)?;
        if !station.has_free_dock() {
            return Err(LedgerError::StationFull {
                station: station.location.clone(),
            });
        }

        let bike = Bike {
            id: BikeId::new(),
            label: label.into(),
        };
        let id = bike.id;
        station.bikes.push(id);
        self.bikes.insert(id, bike);
        Ok(id)
    }

    pub fn register_rider(
        &mut self,
        name: impl Into<String>,
        card_number: impl Into<String>,
        pass: Option<Pass>,
    ) -> RiderId {
        let rider = Rider {
            id: RiderId::new(),
            name: name.into(),
            card_number: card_number.into(),
            pass,
        };
        let id = rider.id;
        self.riders.insert(id, rider);
        id
    }

    pub fn change_pass(&mut self, rider_id: &RiderId, pass: Pass) -> Result<()> {
        self.rider_mut(rider_id)?.pass = Some(pass);
        Ok(())
    }

    /// Add credit to a prepaid pass. Other passes are left unchanged and
    /// `false` is returned.
    pub fn top_up(&mut self, rider_id: &RiderId, amount: Amount) -> Result<bool> {
        match &mut self.rider_mut(rider_id)?.pass {
            Some(Pass::Prepaid { balance }) => {
                *balance = balance.saturating_add(amount.as_decimal());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub fn station(&self, station_id: &StationId) -> Result<&Station> {
        self.stations
            .get(station_id)
            .ok_or_else(|| LedgerError::StationNotFound {
                id: station_id.to_string(),
            })
    }

    fn station_mut(&mut self, station_id: &StationId) -> Result<&mut Station> {
        self.stations
            .get_mut(station_id)
            .ok_or_else(|| LedgerError::StationNotFound {
                id: station_id.to_string(),
            })
    }

    pub fn rider(&self, rider_id: &RiderId) -> Result<&Rider> {
        self.riders
            .get(rider_id)
            .ok_or_else(|| LedgerError::RiderNotFound {
                id: rider_id.to_string(),
            })
    }

    fn rider_mut(&mut self, rider_id: &RiderId) -> Result<&mut Rider> {
        self.riders
            .get_mut(rider_id)
            .ok_or_else(|| LedgerError::RiderNotFound {
                id: rider_id.to_string(),
            })
    }

    pub fn ride(&self, ride_id: &RideId) -> Result<&Ride> {
        self.rides
            .iter()
            .find(|ride| ride.id == *ride_id)
            .ok_or_else(|| LedgerError::RideNotFound {
                id: ride_id.to_string(),
            })
    }

    fn ride_index(&self, ride_id: &RideId) -> Result<usize> {
        self.rides
            .iter()
            .position(|ride| ride.id == *ride_id)
            .ok_or_else(|| LedgerError::RideNotFound {
                id: ride_id.to_string(),
            })
    }

    pub fn rides(&self) -> &[Ride] {
        &self.rides
    }

    /// Take `bike_id` out of `station_id`.
    pub fn start_ride(
        &mut self,
        rider_id: &RiderId,
        bike_id: &BikeId,
        station_id: &StationId,
        at: NaiveDateTime,
    ) -> Result<RideId> {
        self.rider(rider_id)?;
        let station = self.station_mut(station_id)?;
        if !station.is_docked(bike_id) {
            return Err(LedgerError::BikeNotDocked {
                bike: bike_id.to_string(),
                station: station.location.clone(),
            });
        }
        station.bikes.retain(|docked| docked != bike_id);

        let ride = Ride {
            id: RideId::new(),
            rider_id: *rider_id,
            bike_id: *bike_id,
            from_station: *station_id,
            started_at: at,
            to_station: None,
            returned_at: None,
            fare: None,
            payment: None,
        };
        let id = ride.id;
        self.rides.push(ride);
        Ok(id)
    }

    /// Dock the bike at `station_id` and settle the fare. The fare is
    /// evaluated against the pass on the day the ride started.
    pub fn finish_ride(
        &mut self,
        ride_id: &RideId,
        station_id: &StationId,
        at: NaiveDateTime,
    ) -> Result<Fare> {
        let index = self.ride_index(ride_id)?;
        let ride = &self.rides[index];
        if !ride.in_progress() {
            return Err(LedgerError::RideAlreadyFinished {
                id: ride_id.to_string(),
            });
        }
        if at < ride.started_at {
            return Err(LedgerError::InvalidRideWindow {
                started_at: ride.started_at,
                returned_at: at,
            });
        }
        let (rider_id, bike_id, started_at) = (ride.rider_id, ride.bike_id, ride.started_at);

        let station = self.station(station_id)?;
        if !station.has_free_dock() {
            return Err(LedgerError::StationFull {
                station: station.location.clone(),
            });
        }

        let tariffs = self.tariffs.clone();
        let rider = self.rider_mut(&rider_id)?;
        let fare = match rider.pass.as_mut() {
            Some(pass) => pass.charge(at - started_at, started_at.date(), &tariffs),
            None => Fare::Unusable {
                reason: UnusableReason::NoPass,
            },
        };
        let payment = fare.amount().map(|amount| Payment {
            card_number: rider.card_number.clone(),
            amount,
        });
        match fare {
            Fare::Charged { amount } => {
                info!("Ride {} by {} charged {}", ride_id, rider.name, amount)
            }
            Fare::Unusable { reason } => {
                warn!("Ride {} by {} not charged: {}", ride_id, rider.name, reason)
            }
        }

        self.station_mut(station_id)?.bikes.push(bike_id);
        let ride = &mut self.rides[index];
        ride.to_station = Some(*station_id);
        ride.returned_at = Some(at);
        ride.fare = Some(fare);
        ride.payment = payment;
        Ok(fare)
    }

    pub fn stations(&self) -> impl Iterator<Item = &Station> + '_ {
        self.station_order
            .iter()
            .filter_map(move |id| self.stations.get(id))
    }

    pub fn stations_with_bikes(&self) -> Vec<&Station> {
        self.stations().filter(|s| s.has_bikes()).collect()
    }

    pub fn stations_with_free_docks(&self) -> Vec<&Station> {
        self.stations().filter(|s| s.has_free_dock()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn setup() -> (BikeShare, StationId, StationId) {
        let mut share = BikeShare::new(PassTariffs::default()).unwrap();
        let a = share.register_station("Station A", 5);
        let b = share.register_station("Station B", 10);
        (share, a, b)
    }

    #[test]
    fn test_fares_for_a_59_minute_ride() {
        let (mut share, a, b) = setup();
        let june = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        let riders = [
            share.register_rider("U1", "1", Some(Pass::Annual { starts_on: june })),
            share.register_rider("U2", "2", Some(Pass::Prepaid { balance: dec!(100) })),
            share.register_rider("U3", "3", Some(Pass::Tourist { starts_on: june })),
        ];

        let mut fares = Vec::new();
        for (n, rider) in riders.iter().enumerate() {
            let bike = share.register_bike(&a, format!("B00{}", n + 1)).unwrap();
            let ride = share.start_ride(rider, &bike, &a, at(1, 10, 0)).unwrap();
            fares.push(share.finish_ride(&ride, &b, at(1, 10, 59)).unwrap().amount().unwrap());
        }

        assert_eq!(
            fares.iter().map(|f| f.as_decimal()).collect::<Vec<_>>(),
            vec![dec!(12), dec!(20), dec!(10)]
        );
        assert_eq!(
            share.rider(&riders[1]).unwrap().pass,
            Some(Pass::Prepaid { balance: dec!(80) })
        );
        assert!(share.stations_with_bikes().iter().all(|s| s.id == b));
        assert_eq!(share.stations_with_free_docks().len(), 2);
    }

    #[test]
    fn test_expired_and_empty_passes_are_unusable() {
        let (mut share, a, b) = setup();
        let tourist = share.register_rider(
            "T",
            "9",
            Some(Pass::Tourist {
                starts_on: NaiveDate::from_ymd_opt(2025, 5, 1).unwrap(),
            }),
        );
        let broke = share.register_rider("P", "8", Some(Pass::Prepaid { balance: dec!(4) }));

        let bike = share.register_bike(&a, "B1").unwrap();
        let ride = share.start_ride(&tourist, &bike, &a, at(1, 9, 0)).unwrap();
        let fare = share.finish_ride(&ride, &b, at(1, 9, 20)).unwrap();
        assert_eq!(fare, Fare::Unusable { reason: UnusableReason::Expired });
        assert!(share.ride(&ride).unwrap().payment.is_none());
        assert!(!share.ride(&ride).unwrap().in_progress());

        let ride = share.start_ride(&broke, &bike, &b, at(1, 10, 0)).unwrap();
        let fare = share.finish_ride(&ride, &a, at(1, 10, 5)).unwrap();
        assert_eq!(
            fare,
            Fare::Unusable {
                reason: UnusableReason::InsufficientBalance
            }
        );
    }

    #[test]
    fn test_full_station_rejects_bikes() {
        let mut share = BikeShare::new(PassTariffs::default()).unwrap();
        let tiny = share.register_station("Tiny", 1);
        share.register_bike(&tiny, "B1").unwrap();

        let err = share.register_bike(&tiny, "B2").unwrap_err();
        assert!(matches!(err, LedgerError::StationFull { .. }));
        assert!(err.is_rejection());
    }

    #[test]
    fn test_ride_lifecycle_errors() {
        let (mut share, a, b) = setup();
        let rider = share.register_rider(
            "U",
            "1",
            Some(Pass::Annual {
                starts_on: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            }),
        );
        let bike = share.register_bike(&a, "B1").unwrap();

        let wrong_station = share.start_ride(&rider, &bike, &b, at(2, 8, 0));
        assert!(matches!(wrong_station, Err(LedgerError::BikeNotDocked { .. })));

        let ride = share.start_ride(&rider, &bike, &a, at(2, 8, 0)).unwrap();
        let backwards = share.finish_ride(&ride, &b, at(2, 7, 0));
        assert!(matches!(backwards, Err(LedgerError::InvalidRideWindow { .. })));
        assert!(share.ride(&ride).unwrap().in_progress());

        // Within the free half hour the annual pass pays a single block.
        let fare = share.finish_ride(&ride, &b, at(2, 8, 25)).unwrap();
        assert_eq!(fare.amount().unwrap().as_decimal(), dec!(2));

        let twice = share.finish_ride(&ride, &b, at(2, 9, 0));
        assert!(matches!(twice, Err(LedgerError::RideAlreadyFinished { .. })));
        assert_eq!(share.station(&b).unwrap().bikes, vec![bike]);
    }

    #[test]
    fn test_invalid_tariffs_are_refused() {
        let tariffs = PassTariffs {
            prepaid_block_minutes: 0,
            ..Default::default()
        };
        let err = BikeShare::new(tariffs).unwrap_err();
        assert!(matches!(err, LedgerError::Config { .. }));

        let tariffs = PassTariffs {
            annual_validity_days: 1_000_000_000,
            ..Default::default()
        };
        assert!(BikeShare::new(tariffs).is_err());
    }

    #[test]
    fn test_pass_starting_at_calendar_end_stays_valid() {
        let tariffs = PassTariffs::default();
        let pass = Pass::Annual {
            starts_on: NaiveDate::MAX,
        };
        assert_eq!(pass.check_valid(NaiveDate::MAX, &tariffs), Ok(()));

        let tourist = Pass::Tourist {
            starts_on: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        };
        let late = NaiveDate::from_ymd_opt(2025, 6, 9).unwrap();
        assert_eq!(tourist.check_valid(late, &tariffs), Err(UnusableReason::Expired));
    }

    #[test]
    fn test_top_up_only_prepaid() {
        let (mut share, _, _) = setup();
        let prepaid = share.register_rider("P", "1", Some(Pass::Prepaid { balance: dec!(1) }));
        let annual = share.register_rider(
            "A",
            "2",
            Some(Pass::Annual {
                starts_on: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            }),
        );

        assert!(share.top_up(&prepaid, Amount::from(10u32)).unwrap());
        assert!(!share.top_up(&annual, Amount::from(10u32)).unwrap());
        assert_eq!(
            share.rider(&prepaid).unwrap().pass,
            Some(Pass::Prepaid { balance: dec!(11) })
        );
    }
}
