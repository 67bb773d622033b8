//! The four-step booking flow: pick a service, pick a date and time, enter
//! contact details, confirm. Validation failures only flag fields; they never
//! abort the flow.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Booking, TimeSlot};
use crate::services::catalog;
use crate::services::gateway::{BookingForm, BookingGateway};
use crate::services::session::SessionContext;

pub const DASHBOARD_REDIRECT: &str = "/dashboard";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    SelectingService = 1,
    SelectingSchedule = 2,
    EnteringDetails = 3,
    Confirming = 4,
}

impl WizardStep {
    pub fn number(self) -> u8 {
        self as u8
    }

    fn next(self) -> Self {
        match self {
            WizardStep::SelectingService => WizardStep::SelectingSchedule,
            WizardStep::SelectingSchedule => WizardStep::EnteringDetails,
            WizardStep::EnteringDetails | WizardStep::Confirming => WizardStep::Confirming,
        }
    }

    fn prev(self) -> Self {
        match self {
            WizardStep::SelectingService | WizardStep::SelectingSchedule => WizardStep::SelectingService,
            WizardStep::EnteringDetails => WizardStep::SelectingSchedule,
            WizardStep::Confirming => WizardStep::EnteringDetails,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Service,
    Date,
    TimeSlot,
    Name,
    Email,
    Phone,
}

/// A toast shown to the user after submitting.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
}

#[derive(Debug)]
pub enum SubmitOutcome {
    /// No signed-in user. Nothing was sent.
    RedirectToAuth,
    /// Some step does not validate; the wizard moved back to it.
    Invalid {
        step: WizardStep,
        fields: Vec<FormField>,
    },
    Submitted {
        booking: Booking,
        notification: Notification,
        redirect: &'static str,
    },
    /// The gateway refused; the wizard keeps its state for a retry.
    Failed { notification: Notification },
}

#[derive(Debug, Clone)]
pub struct BookingWizard {
    step: WizardStep,
    form: BookingForm,
    errors: BTreeSet<FormField>,
    time_slots: Vec<TimeSlot>,
}

impl Default for BookingWizard {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingWizard {
    pub fn new() -> Self {
        Self {
            step: WizardStep::SelectingService,
            form: BookingForm::default(),
            errors: BTreeSet::new(),
            time_slots: Vec::new(),
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn form(&self) -> &BookingForm {
        &self.form
    }

    pub fn errors(&self) -> Vec<FormField> {
        self.errors.iter().copied().collect()
    }

    pub fn has_error(&self, field: FormField) -> bool {
        self.errors.contains(&field)
    }

    pub fn time_slots(&self) -> &[TimeSlot] {
        &self.time_slots
    }

    pub fn select_service(&mut self, service_id: i64) {
        self.form.service_id = Some(service_id);
        self.errors.remove(&FormField::Service);
    }

    /// Sets the date, reloads the slot list for it and drops any previously
    /// chosen slot.
    pub async fn select_date(
        &mut self,
        date: NaiveDate,
        gateway: &dyn BookingGateway,
    ) -> anyhow::Result<()> {
        self.form.date = Some(date);
        self.form.time_slot = None;
        self.errors.remove(&FormField::Date);
        self.time_slots = match gateway.time_slots(date).await {
            Ok(slots) => slots,
            Err(e) => {
                self.time_slots.clear();
                return Err(e);
            }
        };
        Ok(())
    }

    /// Accepts only a slot that is listed for the selected date and still free.
    pub fn select_time_slot(&mut self, time: &str) -> bool {
        let available = self
            .time_slots
            .iter()
            .any(|slot| slot.time == time && slot.available);
        if available {
            self.form.time_slot = Some(time.to_string());
            self.errors.remove(&FormField::TimeSlot);
        }
        available
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.form.name = name.into();
    }

    pub fn set_email(&mut self, email: impl Into<String>) {
        self.form.email = email.into();
    }

    pub fn set_phone(&mut self, phone: impl Into<String>) {
        self.form.phone = phone.into();
    }

    pub fn set_vehicle_info(&mut self, vehicle_info: impl Into<String>) {
        self.form.vehicle_info = vehicle_info.into();
    }

    /// Checks one step, replacing that step's error flags. Returns whether it
    /// passed. Confirming has nothing of its own to check.
    pub fn validate_step(&mut self, step: WizardStep) -> bool {
        let checks: Vec<(FormField, bool)> = match step {
            WizardStep::SelectingService => vec![(
                FormField::Service,
                self.form.service_id.and_then(catalog::find).is_some(),
            )],
            WizardStep::SelectingSchedule => vec![
                (FormField::Date, self.form.date.is_some()),
                (FormField::TimeSlot, self.form.time_slot.is_some()),
            ],
            WizardStep::EnteringDetails => vec![
                (FormField::Name, !self.form.name.trim().is_empty()),
                (FormField::Email, !self.form.email.trim().is_empty()),
                (FormField::Phone, !self.form.phone.trim().is_empty()),
            ],
            WizardStep::Confirming => vec![],
        };

        let mut valid = true;
        for (field, ok) in checks {
            if ok {
                self.errors.remove(&field);
            } else {
                self.errors.insert(field);
                valid = false;
            }
        }
        valid
    }

    pub fn next(&mut self) -> bool {
        if !self.validate_step(self.step) {
            return false;
        }
        self.step = self.step.next();
        true
    }

    pub fn back(&mut self) {
        self.step = self.step.prev();
    }

    /// Moves forward until a step fails or the confirmation step is reached.
    pub fn advance_to_confirmation(&mut self) -> WizardStep {
        while self.step != WizardStep::Confirming && self.next() {}
        self.step
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub async fn submit(
        &mut self,
        session: &SessionContext,
        gateway: &dyn BookingGateway,
    ) -> SubmitOutcome {
        let Some(identity) = session.current_user() else {
            tracing::info!("booking requires sign-in, redirecting");
            return SubmitOutcome::RedirectToAuth;
        };

        if self.step != WizardStep::Confirming {
            self.validate_step(self.step);
            return SubmitOutcome::Invalid {
                step: self.step,
                fields: self.errors(),
            };
        }

        for step in [
            WizardStep::SelectingService,
            WizardStep::SelectingSchedule,
            WizardStep::EnteringDetails,
        ] {
            if !self.validate_step(step) {
                self.step = step;
                return SubmitOutcome::Invalid {
                    step,
                    fields: self.errors(),
                };
            }
        }

        match gateway.submit(Some(identity), &self.form).await {
            Some(booking) => {
                let notification = Notification {
                    title: "Booking Request Received!".to_string(),
                    description: format!(
                        "We've received your booking request for {} at {}. We'll contact you shortly to confirm.",
                        booking.date.format("%B %-d, %Y"),
                        booking.time_slot
                    ),
                };
                self.reset();
                SubmitOutcome::Submitted {
                    booking,
                    notification,
                    redirect: DASHBOARD_REDIRECT,
                }
            }
            None => SubmitOutcome::Failed {
                notification: Notification {
                    title: "Booking failed".to_string(),
                    description: "We couldn't save your booking. Please try again.".to_string(),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::NaiveTime;
    use tokio::sync::broadcast;

    use super::*;
    use crate::models::{BookingStatus, Identity, Role, Session};
    use crate::services::auth::{AuthError, AuthProvider, SignUp};
    use crate::services::slots;

    struct MockGateway {
        accept: bool,
        submitted: Mutex<Vec<BookingForm>>,
    }

    impl MockGateway {
        fn new(accept: bool) -> Self {
            Self {
                accept,
                submitted: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl BookingGateway for MockGateway {
        async fn time_slots(&self, date: NaiveDate) -> anyhow::Result<Vec<TimeSlot>> {
            let mut booked = std::collections::HashMap::new();
            booked.insert("9:00 AM".to_string(), 1);
            Ok(slots::generate_time_slots(date, date.and_time(NaiveTime::MIN), &booked, 1))
        }

        async fn submit(&self, identity: Option<&Identity>, form: &BookingForm) -> Option<Booking> {
            self.submitted.lock().unwrap().push(form.clone());
            if !self.accept {
                return None;
            }
            let now = chrono::Utc::now().naive_utc();
            Some(Booking {
                id: "bk-1".to_string(),
                user_id: identity?.user_id.clone(),
                service_id: form.service_id?,
                service_title: catalog::title_for(form.service_id?).to_string(),
                date: form.date?,
                time_slot: form.time_slot.clone()?,
                vehicle_info: None,
                status: BookingStatus::Pending,
                created_at: now,
                updated_at: now,
            })
        }
    }

    struct StaticAuth;

    #[async_trait]
    impl AuthProvider for StaticAuth {
        async fn sign_up(&self, _request: SignUp) -> Result<Session, AuthError> {
            Err(AuthError::InvalidInput("unsupported".to_string()))
        }

        async fn sign_in(&self, _email: &str, _password: &str) -> Result<Session, AuthError> {
            Err(AuthError::InvalidCredentials)
        }

        async fn sign_out(&self, _token: &str) -> Result<(), AuthError> {
            Ok(())
        }

        async fn current_user(&self, token: &str) -> Result<Option<Session>, AuthError> {
            Ok((token == "good").then(|| Session {
                token: token.to_string(),
                identity: Identity {
                    user_id: "u1".to_string(),
                    email: "jane@x.com".to_string(),
                    full_name: Some("Jane Doe".to_string()),
                    role: Role::Customer,
                },
                expires_at: chrono::Utc::now().naive_utc(),
            }))
        }
    }

    async fn session(token: Option<&str>) -> SessionContext {
        let (tx, _) = broadcast::channel(4);
        let mut ctx = SessionContext::new(Arc::new(StaticAuth), tx);
        ctx.restore(token).await.unwrap();
        ctx
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
    }

    async fn filled(gateway: &MockGateway) -> BookingWizard {
        let mut wizard = BookingWizard::new();
        wizard.select_service(1);
        assert!(wizard.next());
        wizard.select_date(day(), gateway).await.unwrap();
        assert!(wizard.select_time_slot("10:00 AM"));
        assert!(wizard.next());
        wizard.set_name("Jane Doe");
        wizard.set_email("jane@x.com");
        wizard.set_phone("5551234567");
        assert!(wizard.next());
        assert_eq!(wizard.step(), WizardStep::Confirming);
        wizard
    }

    #[test]
    fn test_step_one_blocked_without_service() {
        let mut wizard = BookingWizard::new();
        assert!(!wizard.next());
        assert_eq!(wizard.step(), WizardStep::SelectingService);
        assert!(wizard.has_error(FormField::Service));

        wizard.select_service(99);
        assert!(!wizard.next());

        wizard.select_service(1);
        assert!(wizard.next());
        assert_eq!(wizard.step(), WizardStep::SelectingSchedule);
        assert!(wizard.errors().is_empty());
    }

    #[tokio::test]
    async fn test_step_two_requires_date_and_time() {
        let gateway = MockGateway::new(true);
        let mut wizard = BookingWizard::new();
        wizard.select_service(2);
        wizard.next();

        assert!(!wizard.next());
        assert_eq!(wizard.errors(), vec![FormField::Date, FormField::TimeSlot]);

        wizard.select_date(day(), &gateway).await.unwrap();
        assert!(!wizard.next());
        assert_eq!(wizard.errors(), vec![FormField::TimeSlot]);

        assert!(wizard.select_time_slot("2:30 PM"));
        assert!(wizard.next());
        assert_eq!(wizard.step(), WizardStep::EnteringDetails);
    }

    #[tokio::test]
    async fn test_selecting_date_clears_slot() {
        let gateway = MockGateway::new(true);
        let mut wizard = BookingWizard::new();
        wizard.select_date(day(), &gateway).await.unwrap();
        assert_eq!(wizard.time_slots().len(), 20);
        assert!(wizard.select_time_slot("10:00 AM"));

        wizard.select_date(day().succ_opt().unwrap(), &gateway).await.unwrap();
        assert_eq!(wizard.form().time_slot, None);
    }

    #[tokio::test]
    async fn test_unavailable_slot_rejected() {
        let gateway = MockGateway::new(true);
        let mut wizard = BookingWizard::new();
        assert!(!wizard.select_time_slot("10:00 AM"));

        wizard.select_date(day(), &gateway).await.unwrap();
        assert!(!wizard.select_time_slot("9:00 AM"));
        assert!(!wizard.select_time_slot("7:00 PM"));
        assert_eq!(wizard.form().time_slot, None);
    }

    #[test]
    fn test_step_three_requires_contact_fields() {
        let mut wizard = BookingWizard::new();
        wizard.set_name("Jane Doe");
        wizard.set_email("   ");
        assert!(!wizard.validate_step(WizardStep::EnteringDetails));
        assert_eq!(wizard.errors(), vec![FormField::Email, FormField::Phone]);

        wizard.set_email("jane@x.com");
        wizard.set_phone("5551234567");
        assert!(wizard.validate_step(WizardStep::EnteringDetails));
        assert!(wizard.errors().is_empty());
    }

    #[tokio::test]
    async fn test_back_is_unconditional() {
        let gateway = MockGateway::new(true);
        let mut wizard = filled(&gateway).await;
        wizard.set_name("");
        wizard.back();
        assert_eq!(wizard.step(), WizardStep::EnteringDetails);
        wizard.back();
        wizard.back();
        wizard.back();
        assert_eq!(wizard.step(), WizardStep::SelectingService);
    }

    #[tokio::test]
    async fn test_submit_without_session_redirects() {
        let gateway = MockGateway::new(true);
        let mut wizard = filled(&gateway).await;
        let outcome = wizard.submit(&session(None).await, &gateway).await;

        assert!(matches!(outcome, SubmitOutcome::RedirectToAuth));
        assert!(gateway.submitted.lock().unwrap().is_empty());
        assert_eq!(wizard.step(), WizardStep::Confirming);
    }

    #[tokio::test]
    async fn test_submit_success_resets_wizard() {
        let gateway = MockGateway::new(true);
        let mut wizard = filled(&gateway).await;
        let outcome = wizard.submit(&session(Some("good")).await, &gateway).await;

        let SubmitOutcome::Submitted { booking, notification, redirect } = outcome else {
            panic!("expected a submitted booking");
        };
        assert_eq!(booking.service_title, "Oil Change Service");
        assert_eq!(booking.time_slot, "10:00 AM");
        assert_eq!(redirect, "/dashboard");
        assert!(notification.description.contains("October 20, 2026 at 10:00 AM"));

        assert_eq!(wizard.step(), WizardStep::SelectingService);
        assert_eq!(wizard.form(), &BookingForm::default());
        assert!(wizard.time_slots().is_empty());
    }

    #[tokio::test]
    async fn test_submit_failure_keeps_state() {
        let gateway = MockGateway::new(false);
        let mut wizard = filled(&gateway).await;
        let before = wizard.form().clone();

        let outcome = wizard.submit(&session(Some("good")).await, &gateway).await;
        assert!(matches!(outcome, SubmitOutcome::Failed { .. }));
        assert_eq!(wizard.form(), &before);
        assert_eq!(wizard.step(), WizardStep::Confirming);
        assert_eq!(gateway.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_revalidates_and_jumps_to_failing_step() {
        let gateway = MockGateway::new(true);
        let mut wizard = filled(&gateway).await;
        wizard.set_phone("");

        let outcome = wizard.submit(&session(Some("good")).await, &gateway).await;
        let SubmitOutcome::Invalid { step, fields } = outcome else {
            panic!("expected invalid outcome");
        };
        assert_eq!(step, WizardStep::EnteringDetails);
        assert_eq!(fields, vec![FormField::Phone]);
        assert!(gateway.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_before_confirmation_is_invalid() {
        let gateway = MockGateway::new(true);
        let mut wizard = BookingWizard::new();
        let outcome = wizard.submit(&session(Some("good")).await, &gateway).await;
        assert!(matches!(
            outcome,
            SubmitOutcome::Invalid { step: WizardStep::SelectingService, .. }
        ));
    }

    #[tokio::test]
    async fn test_advance_to_confirmation_stops_at_first_gap() {
        let gateway = MockGateway::new(true);
        let mut wizard = BookingWizard::new();
        wizard.select_service(1);
        wizard.select_date(day(), &gateway).await.unwrap();
        wizard.select_time_slot("11:00 AM");
        wizard.set_name("Jane Doe");

        assert_eq!(wizard.advance_to_confirmation(), WizardStep::EnteringDetails);
        assert!(wizard.has_error(FormField::Email));
    }
}
