//! The four-step rental booking flow.
//!
//! A [`RentalWizard`] walks a renter through dates, pickup and dropoff,
//! driver details and a final review. Only the dates step gates progress.
//! Confirming the review consumes the wizard and returns a [`RentalSummary`];
//! nothing is stored.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::listing::{CarListing, Price};

/// A step of the rental wizard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WizardStep {
    /// Step 1: rental dates.
    Dates,
    /// Step 2: pickup and dropoff.
    PickupDropoff,
    /// Step 3: driver information.
    Driver,
    /// Step 4: review and confirm.
    Review,
}

impl WizardStep {
    /// Number of steps.
    pub const COUNT: usize = 4;

    /// 1-based position of the step.
    #[must_use]
    pub fn number(self) -> usize {
        match self {
            Self::Dates => 1,
            Self::PickupDropoff => 2,
            Self::Driver => 3,
            Self::Review => 4,
        }
    }

    /// Short machine name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Dates => "dates",
            Self::PickupDropoff => "pickup_dropoff",
            Self::Driver => "driver",
            Self::Review => "review",
        }
    }

    /// Heading shown for the step.
    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Dates => "Select Rental Dates",
            Self::PickupDropoff => "Pickup & Dropoff",
            Self::Driver => "Driver Information",
            Self::Review => "Review & Confirm",
        }
    }

    fn next(self) -> Self {
        match self {
            Self::Dates => Self::PickupDropoff,
            Self::PickupDropoff => Self::Driver,
            Self::Driver | Self::Review => Self::Review,
        }
    }

    fn previous(self) -> Self {
        match self {
            Self::Dates | Self::PickupDropoff => Self::Dates,
            Self::Driver => Self::PickupDropoff,
            Self::Review => Self::Driver,
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step {}: {}", self.number(), self.title())
    }
}

/// Cost breakdown for a date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalQuote {
    /// Whole days rented; the end date is not counted.
    pub days: u64,
    /// `days * price_per_day`.
    pub cost: Price,
    /// Refundable security deposit.
    pub deposit: Price,
    /// `cost + deposit`.
    pub total: Price,
}

/// Price a rental.
///
/// # Errors
///
/// Returns a validation error unless `end` is after `start`.
pub fn quote(
    start: NaiveDate,
    end: NaiveDate,
    price_per_day: Price,
    deposit: Price,
) -> Result<RentalQuote> {
    let days = u64::try_from((end - start).num_days())
        .ok()
        .filter(|&d| d > 0)
        .ok_or_else(|| Error::invalid_field("end date", "must be after the start date"))?;
    let cost = price_per_day.times(days);
    Ok(RentalQuote {
        days,
        cost,
        deposit,
        total: cost.plus(deposit),
    })
}

/// Fields collected across the wizard.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RentalForm {
    /// First day of the rental.
    pub start_date: Option<NaiveDate>,
    /// Return day.
    pub end_date: Option<NaiveDate>,
    /// Where the car is collected.
    pub pickup_location: String,
    /// Where the car is returned.
    pub dropoff_location: String,
    /// Driver's license number.
    pub driver_license: String,
    /// Insurance details.
    pub insurance_info: String,
}

/// The car being booked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalCar {
    /// Listing identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Owner identifier.
    pub owner: String,
    /// Daily price.
    pub price_per_day: Price,
}

impl From<&CarListing> for RentalCar {
    fn from(listing: &CarListing) -> Self {
        Self {
            id: listing.id.clone(),
            name: listing.name.clone(),
            owner: listing.owner.clone(),
            price_per_day: listing.price_per_day,
        }
    }
}

/// The outcome of a confirmed rental.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentalSummary {
    /// The car.
    pub car: RentalCar,
    /// First day.
    pub start_date: NaiveDate,
    /// Return day.
    pub end_date: NaiveDate,
    /// Pickup location.
    pub pickup_location: String,
    /// Dropoff location.
    pub dropoff_location: String,
    /// Cost breakdown.
    pub quote: RentalQuote,
}

/// Step-by-step rental booking.
#[derive(Debug, Clone)]
pub struct RentalWizard {
    car: RentalCar,
    deposit: Price,
    step: WizardStep,
    form: RentalForm,
}

impl RentalWizard {
    /// Start booking `car` at the first step.
    #[must_use]
    pub fn new(car: impl Into<RentalCar>, deposit: Price) -> Self {
        Self {
            car: car.into(),
            deposit,
            step: WizardStep::Dates,
            form: RentalForm::default(),
        }
    }

    /// Current step.
    #[must_use]
    pub fn step(&self) -> WizardStep {
        self.step
    }

    /// The car being booked.
    #[must_use]
    pub fn car(&self) -> &RentalCar {
        &self.car
    }

    /// Collected fields.
    #[must_use]
    pub fn form(&self) -> &RentalForm {
        &self.form
    }

    /// Collected fields, for editing.
    pub fn form_mut(&mut self) -> &mut RentalForm {
        &mut self.form
    }

    /// Set the date range.
    pub fn set_dates(&mut self, start: NaiveDate, end: NaiveDate) {
        self.form.start_date = Some(start);
        self.form.end_date = Some(end);
    }

    /// The current quote, once a valid date range is set.
    #[must_use]
    pub fn quote(&self) -> Option<RentalQuote> {
        self.checked_quote().ok()
    }

    fn checked_quote(&self) -> Result<RentalQuote> {
        match (self.form.start_date, self.form.end_date) {
            (Some(start), Some(end)) => quote(start, end, self.car.price_per_day, self.deposit),
            _ => Err(Error::IncompleteStep {
                step: WizardStep::Dates.name(),
                message: "Please fill in all required fields".to_string(),
            }),
        }
    }

    /// Advance one step.
    ///
    /// # Errors
    ///
    /// Leaving the dates step requires both dates, with the end after the
    /// start; otherwise a validation error is returned and the step stays.
    pub fn next(&mut self) -> Result<WizardStep> {
        if self.step == WizardStep::Dates {
            let quote = self.checked_quote()?;
            debug!(days = quote.days, cost = %quote.cost, "Dates accepted");
        }
        self.step = self.step.next();
        Ok(self.step)
    }

    /// Go back one step. No-op on the first step.
    pub fn back(&mut self) -> WizardStep {
        self.step = self.step.previous();
        self.step
    }

    /// Confirm the booking.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the wizard is not on the review step.
    pub fn confirm(self) -> Result<RentalSummary> {
        if self.step != WizardStep::Review {
            return Err(Error::IncompleteStep {
                step: self.step.name(),
                message: "finish the remaining steps first".to_string(),
            });
        }
        let quote = self.checked_quote()?;
        let (start_date, end_date) = match (self.form.start_date, self.form.end_date) {
            (Some(start), Some(end)) => (start, end),
            _ => return Err(Error::internal("dates missing on review step")),
        };
        info!(car = %self.car.id, days = quote.days, total = %quote.total, "Rental confirmed");
        Ok(RentalSummary {
            car: self.car,
            start_date,
            end_date,
            pickup_location: self.form.pickup_location.trim().to_string(),
            dropoff_location: self.form.dropoff_location.trim().to_string(),
            quote,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn car() -> RentalCar {
        RentalCar {
            id: "car-1".to_string(),
            name: "Toyota Camry 2020".to_string(),
            owner: "0x742d...d8b6".to_string(),
            price_per_day: Price::from_units(45),
        }
    }

    fn wizard() -> RentalWizard {
        RentalWizard::new(car(), Price::from_units(200))
    }

    #[test]
    fn test_quote_counts_exclusive_days() {
        let q = quote(
            date("2025-03-01"),
            date("2025-03-04"),
            Price::from_units(45),
            Price::from_units(200),
        )
        .unwrap();
        assert_eq!(q.days, 3);
        assert_eq!(q.cost, Price::from_units(135));
        assert_eq!(q.total, Price::from_units(335));
    }

    #[test]
    fn test_quote_cost_is_days_times_price() {
        let price = Price::from_cents(4_550);
        for days in 1..40_i64 {
            let start = date("2024-02-20");
            let end = start + chrono::Duration::days(days);
            let q = quote(start, end, price, Price::default()).unwrap();
            assert_eq!(q.days, days as u64);
            assert_eq!(q.cost.cents(), 4_550 * days as u64);
        }
    }

    #[test]
    fn test_quote_rejects_empty_or_inverted_range() {
        let d = date("2025-03-01");
        assert!(quote(d, d, Price::from_units(1), Price::default()).is_err());
        assert!(quote(d, date("2025-02-01"), Price::from_units(1), Price::default()).is_err());
    }

    #[test]
    fn test_dates_step_gates_progress() {
        let mut w = wizard();
        let err = w.next().unwrap_err();
        assert!(err.is_validation());
        assert_eq!(w.step(), WizardStep::Dates);

        w.form_mut().start_date = Some(date("2025-03-01"));
        assert!(w.next().is_err());

        w.form_mut().end_date = Some(date("2025-02-27"));
        assert!(w.next().is_err());
        assert_eq!(w.step(), WizardStep::Dates);

        w.set_dates(date("2025-03-01"), date("2025-03-03"));
        assert_eq!(w.next().unwrap(), WizardStep::PickupDropoff);
    }

    #[test]
    fn test_other_steps_advance_freely() {
        let mut w = wizard();
        w.set_dates(date("2025-03-01"), date("2025-03-03"));
        w.next().unwrap();
        assert_eq!(w.next().unwrap(), WizardStep::Driver);
        assert_eq!(w.next().unwrap(), WizardStep::Review);
        assert_eq!(w.next().unwrap(), WizardStep::Review);
    }

    #[test]
    fn test_back() {
        let mut w = wizard();
        assert_eq!(w.back(), WizardStep::Dates);
        w.set_dates(date("2025-03-01"), date("2025-03-03"));
        w.next().unwrap();
        w.next().unwrap();
        assert_eq!(w.back(), WizardStep::PickupDropoff);
        assert_eq!(w.back(), WizardStep::Dates);
    }

    #[test]
    fn test_quote_tracks_form() {
        let mut w = wizard();
        assert!(w.quote().is_none());
        w.set_dates(date("2025-03-01"), date("2025-03-06"));
        assert_eq!(w.quote().unwrap().days, 5);
    }

    #[test]
    fn test_confirm_only_on_review() {
        let mut w = wizard();
        w.set_dates(date("2025-03-01"), date("2025-03-03"));
        w.next().unwrap();
        let err = w.clone().confirm().unwrap_err();
        assert!(matches!(
            err,
            Error::IncompleteStep {
                step: "pickup_dropoff",
                ..
            }
        ));

        w.form_mut().pickup_location = " Main St ".to_string();
        w.next().unwrap();
        w.next().unwrap();
        let summary = w.confirm().unwrap();
        assert_eq!(summary.car, car());
        assert_eq!(summary.pickup_location, "Main St");
        assert_eq!(summary.quote.days, 2);
        assert_eq!(summary.quote.total, Price::from_units(290));
    }

    #[test]
    fn test_step_display() {
        assert_eq!(WizardStep::Review.to_string(), "Step 4: Review & Confirm");
        assert_eq!(WizardStep::COUNT, WizardStep::Review.number());
    }
}
