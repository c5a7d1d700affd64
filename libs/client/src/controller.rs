//! Async driver for the flow state machine
//!
//! The controller owns a gateway and shuttles [`PendingOp`] descriptors from
//! the machine to the network and their outcomes back. The machine stays
//! pure; the controller is the only place that awaits. Every call resolves
//! to exactly one event, so a failure can never strand the flow in a loading
//! state.

use chrono::Utc;
use common::{error::AuthError, session::Session};
use tracing::debug;

use crate::flow::{AuthFlow, FlowEvent, OpOutcome, OpRequest, PendingOp};
use crate::gateway::{IdentityGateway, SignUpAttributes};

/// Drives an [`AuthFlow`] against an [`IdentityGateway`]
pub struct FlowController<G> {
    flow: AuthFlow,
    gateway: G,
}

impl<G: IdentityGateway> FlowController<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            flow: AuthFlow::new(),
            gateway,
        }
    }

    pub fn flow(&self) -> &AuthFlow {
        &self.flow
    }

    pub fn flow_mut(&mut self) -> &mut AuthFlow {
        &mut self.flow
    }

    /// Submit the sign-in form
    pub async fn submit_sign_in(&mut self) -> FlowEvent {
        let Some(op) = self.flow.begin_sign_in() else {
            return FlowEvent::Idle;
        };
        self.run(op).await
    }

    /// Submit the sign-up draft
    pub async fn submit_sign_up(&mut self) -> FlowEvent {
        let Some(op) = self.flow.begin_sign_up() else {
            return FlowEvent::Idle;
        };
        self.run(op).await
    }

    /// Submit the entered verification code
    pub async fn submit_verification(&mut self) -> FlowEvent {
        let Some(op) = self.flow.begin_verification() else {
            return FlowEvent::Idle;
        };
        self.run(op).await
    }

    /// Ask for a fresh confirmation code
    ///
    /// Refused locally while the cooldown is running; in that case the
    /// gateway is never called.
    pub async fn resend_code(&mut self) -> FlowEvent {
        let Some(op) = self.flow.begin_resend(Utc::now()) else {
            return FlowEvent::Idle;
        };
        self.run(op).await
    }

    /// Start the forgot-password sub-flow for the entered email
    pub async fn request_password_reset(&mut self) -> FlowEvent {
        let Some(op) = self.flow.begin_reset_request() else {
            return FlowEvent::Idle;
        };
        self.run(op).await
    }

    /// Complete the forgot-password sub-flow
    pub async fn submit_password_reset(&mut self) -> FlowEvent {
        let Some(op) = self.flow.begin_reset_submit() else {
            return FlowEvent::Idle;
        };
        self.run(op).await
    }

    /// Return a session that is valid at `now`, refreshing if necessary
    ///
    /// A stale session is exchanged through the refresh operation; the
    /// replacement is stored wholesale. With no session at all this is
    /// `Ok(None)`: the caller must run the sign-in flow.
    pub async fn ensure_fresh_session(&mut self) -> Result<Option<Session>, AuthError> {
        let now = Utc::now();
        let Some(current) = self.flow.store().current() else {
            return Ok(None);
        };
        if current.is_valid(now) {
            return Ok(Some(current.clone()));
        }

        let refresh_token = current.refresh_token.clone();
        match self.gateway.refresh_session(&refresh_token).await {
            Ok(session) => {
                self.flow.store_mut().replace(session.clone());
                Ok(Some(session))
            }
            Err(e @ AuthError::SessionExpired) => {
                // The refresh token itself is dead; the session is gone.
                self.flow.store_mut().clear();
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    async fn run(&mut self, op: PendingOp) -> FlowEvent {
        let outcome = self.perform(op.request).await;
        let event = self.flow.resolve(op.tag, outcome, Utc::now());
        if event == FlowEvent::Discarded {
            debug!("discarded outcome for a superseded operation");
        }
        event
    }

    async fn perform(&self, request: OpRequest) -> OpOutcome {
        match request {
            OpRequest::SignIn { email, password } => {
                OpOutcome::SignIn(self.gateway.sign_in(&email, &password).await)
            }
            OpRequest::SignUp {
                email,
                password,
                first_name,
                last_name,
            } => OpOutcome::SignUp(
                self.gateway
                    .initiate_sign_up(
                        &email,
                        &password,
                        &SignUpAttributes {
                            first_name,
                            last_name,
                        },
                    )
                    .await,
            ),
            OpRequest::Confirm { email, code } => {
                OpOutcome::Confirm(self.gateway.confirm_sign_up(&email, &code).await)
            }
            OpRequest::Resend { email } => {
                OpOutcome::Resend(self.gateway.resend_confirmation(&email).await)
            }
            OpRequest::ResetRequest { email } => {
                OpOutcome::ResetRequest(self.gateway.request_password_reset(&email).await)
            }
            OpRequest::ResetSubmit {
                email,
                code,
                new_password,
            } => OpOutcome::ResetSubmit(
                self.gateway
                    .confirm_password_reset(&email, &code, &new_password)
                    .await,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Step;
    use crate::gateway::{ResendReceipt, SignInOutcome, SignUpOutcome};
    use chrono::Duration;
    use std::sync::Mutex;

    /// Scripted gateway recording every call it receives
    struct MockGateway {
        sign_in: Result<SignInOutcome, AuthError>,
        sign_up: Result<SignUpOutcome, AuthError>,
        confirm: Result<(), AuthError>,
        resend: Result<ResendReceipt, AuthError>,
        refresh: Result<Session, AuthError>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl Default for MockGateway {
        fn default() -> Self {
            Self {
                sign_in: Ok(SignInOutcome {
                    user_id: "user-1".to_string(),
                    session: None,
                    needs_verification: false,
                }),
                sign_up: Ok(SignUpOutcome {
                    user_id: "user-1".to_string(),
                    confirmed: false,
                }),
                confirm: Ok(()),
                resend: Ok(ResendReceipt {
                    delivery_channel: "EMAIL".to_string(),
                    destination: "a***@b.com".to_string(),
                }),
                refresh: Err(AuthError::RefreshInvalid),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl MockGateway {
        fn record(&self, name: &'static str) {
            self.calls.lock().unwrap().push(name);
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl IdentityGateway for MockGateway {
        async fn sign_in(&self, _: &str, _: &str) -> Result<SignInOutcome, AuthError> {
            self.record("sign_in");
            self.sign_in.clone()
        }

        async fn initiate_sign_up(
            &self,
            _: &str,
            _: &str,
            _: &SignUpAttributes,
        ) -> Result<SignUpOutcome, AuthError> {
            self.record("initiate_sign_up");
            self.sign_up.clone()
        }

        async fn confirm_sign_up(&self, _: &str, _: &str) -> Result<(), AuthError> {
            self.record("confirm_sign_up");
            self.confirm.clone()
        }

        async fn resend_confirmation(&self, _: &str) -> Result<ResendReceipt, AuthError> {
            self.record("resend_confirmation");
            self.resend.clone()
        }

        async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
            self.record("refresh_session");
            // Provider contract: the refresh token is carried forward unchanged.
            self.refresh.clone().map(|mut s| {
                s.refresh_token = refresh_token.to_string();
                s
            })
        }

        async fn account_exists(&self, _: &str) -> Result<bool, AuthError> {
            self.record("account_exists");
            Ok(true)
        }

        async fn request_password_reset(&self, _: &str) -> Result<(), AuthError> {
            self.record("request_password_reset");
            Ok(())
        }

        async fn confirm_password_reset(
            &self,
            _: &str,
            _: &str,
            _: &str,
        ) -> Result<(), AuthError> {
            self.record("confirm_password_reset");
            Ok(())
        }
    }

    fn fill_sign_up(controller: &mut FlowController<MockGateway>) {
        let flow = controller.flow_mut();
        flow.go_to_step(Step::SignupPassword);
        flow.set_first_name("Ada");
        flow.set_last_name("Lovelace");
        flow.set_email("a@b.com");
        flow.set_password("Abcdefg1");
        flow.set_confirm_password("Abcdefg1");
    }

    #[tokio::test]
    async fn test_sign_up_then_wrong_code_stays_on_verify() {
        let gateway = MockGateway {
            confirm: Err(AuthError::CodeMismatch),
            ..MockGateway::default()
        };
        let mut controller = FlowController::new(gateway);
        fill_sign_up(&mut controller);

        let event = controller.submit_sign_up().await;
        assert_eq!(event, FlowEvent::VerificationRequired);
        assert_eq!(controller.flow().step(), Step::Verify);

        controller.flow_mut().set_verification_code("000000");
        let event = controller.submit_verification().await;
        assert_eq!(event, FlowEvent::Idle);
        assert_eq!(controller.flow().step(), Step::Verify);
        assert_eq!(
            controller.flow().error(),
            Some("Invalid code. Please check and try again.")
        );
        assert!(!controller.flow().is_loading());
        assert_eq!(
            controller.gateway.calls(),
            vec!["initiate_sign_up", "confirm_sign_up"]
        );
    }

    #[tokio::test]
    async fn test_resend_within_cooldown_never_reaches_gateway() {
        let mut controller = FlowController::new(MockGateway::default());
        fill_sign_up(&mut controller);

        // Sign-up success counts as the initial code delivery.
        controller.submit_sign_up().await;
        assert_eq!(controller.flow().step(), Step::Verify);

        let event = controller.resend_code().await;
        assert_eq!(event, FlowEvent::Idle);
        assert_eq!(controller.gateway.calls(), vec!["initiate_sign_up"]);
    }

    #[tokio::test]
    async fn test_sign_in_with_session_emits_signed_in() {
        let now = Utc::now();
        let gateway = MockGateway {
            sign_in: Ok(SignInOutcome {
                user_id: "user-7".to_string(),
                session: Some(Session::issued(
                    "a".into(),
                    "i".into(),
                    "r".into(),
                    now,
                    3600,
                    "Bearer".into(),
                )),
                needs_verification: false,
            }),
            ..MockGateway::default()
        };
        let mut controller = FlowController::new(gateway);
        controller.flow_mut().set_sign_in_email("a@b.com");
        controller.flow_mut().set_sign_in_password("Abcdefg1");

        let event = controller.submit_sign_in().await;
        assert_eq!(
            event,
            FlowEvent::SignedIn {
                user_id: "user-7".to_string()
            }
        );
        assert!(controller.flow().store().is_valid(Utc::now()));
    }

    #[tokio::test]
    async fn test_refresh_preserves_refresh_token() {
        let now = Utc::now();
        let gateway = MockGateway {
            refresh: Ok(Session::issued(
                "new-access".into(),
                "new-id".into(),
                "placeholder".into(),
                now,
                3600,
                "Bearer".into(),
            )),
            ..MockGateway::default()
        };
        let mut controller = FlowController::new(gateway);

        // Hold a stale session.
        controller.flow_mut().store_mut().replace(Session::issued(
            "old-access".into(),
            "old-id".into(),
            "original-refresh".into(),
            now - Duration::seconds(7200),
            3600,
            "Bearer".into(),
        ));

        let refreshed = controller
            .ensure_fresh_session()
            .await
            .expect("refresh should succeed")
            .expect("a session should be returned");
        assert_eq!(refreshed.refresh_token, "original-refresh");
        assert_eq!(refreshed.access_token, "new-access");
        assert_eq!(controller.gateway.calls(), vec!["refresh_session"]);
    }

    #[tokio::test]
    async fn test_expired_refresh_clears_store() {
        let now = Utc::now();
        let gateway = MockGateway {
            refresh: Err(AuthError::SessionExpired),
            ..MockGateway::default()
        };
        let mut controller = FlowController::new(gateway);
        controller.flow_mut().store_mut().replace(Session::issued(
            "a".into(),
            "i".into(),
            "r".into(),
            now - Duration::seconds(7200),
            3600,
            "Bearer".into(),
        ));

        let result = controller.ensure_fresh_session().await;
        assert_eq!(result, Err(AuthError::SessionExpired));
        assert!(controller.flow().store().current().is_none());
    }

    #[tokio::test]
    async fn test_valid_session_skips_refresh() {
        let now = Utc::now();
        let mut controller = FlowController::new(MockGateway::default());
        controller.flow_mut().store_mut().replace(Session::issued(
            "a".into(),
            "i".into(),
            "r".into(),
            now,
            3600,
            "Bearer".into(),
        ));

        let session = controller
            .ensure_fresh_session()
            .await
            .expect("should succeed");
        assert!(session.is_some());
        assert!(controller.gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn test_password_reset_round_trip() {
        let mut controller = FlowController::new(MockGateway::default());
        controller.flow_mut().set_sign_in_email("a@b.com");
        controller.flow_mut().go_to_forgot_password();

        controller.request_password_reset().await;
        assert_eq!(controller.flow().step(), Step::ResetPassword);

        controller.flow_mut().set_reset_code("123456");
        controller.flow_mut().set_reset_password("Abcdefg2");
        controller.submit_password_reset().await;
        assert_eq!(controller.flow().step(), Step::SignIn);
        assert!(controller.flow().notice().is_some());
    }
}
