//! Registration/sign-in flow state machine
//!
//! The flow is an explicit finite-state machine: an enumerated step plus the
//! data scoped to it, so illegal combinations ("verifying" while "complete")
//! are unrepresentable. The machine itself is pure and synchronous; network
//! work is described by [`PendingOp`] values it hands out and applied back
//! through [`AuthFlow::resolve`]. Every operation carries a tag, and a
//! resolution whose tag no longer matches the machine (the user navigated
//! away, or a newer operation started) is discarded instead of applied.

use chrono::{DateTime, Duration, Utc};
use common::error::AuthError;
use common::session::Session;

use crate::gateway::{ResendReceipt, SignInOutcome, SignUpOutcome};
use crate::policy::PasswordChecks;
use crate::store::TokenStore;

/// Seconds a user must wait between confirmation-code resends
pub const RESEND_COOLDOWN_SECONDS: i64 = 60;

/// Exact length of a confirmation code
pub const VERIFICATION_CODE_LENGTH: usize = 6;

/// Ticks an informational notice stays visible before auto-clearing
const NOTICE_TTL_TICKS: u32 = 5;

const GENERIC_ERROR: &str = "Something went wrong. Please try again.";
const INVALID_CODE_ERROR: &str = "Invalid code. Please check and try again.";
const EXPIRED_CODE_ERROR: &str = "This code has expired. Please request a new one.";
const RATE_LIMITED_ERROR: &str = "Too many attempts. Please wait a moment and try again.";

/// Steps of the registration/sign-in flow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    SignIn,
    Welcome,
    SignupName,
    SignupEmail,
    SignupPassword,
    Verify,
    ForgotPassword,
    ResetPassword,
    Complete,
}

/// In-progress sign-up input, never persisted outside the active flow
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub verification_code: String,
}

/// Sign-in credentials, kept apart from the sign-up draft so the
/// forgot-password sub-flow never disturbs an unrelated sign-up in progress
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

/// A sign-up awaiting email confirmation
///
/// `last_sent_at` is `None` when no code was sent in this flow yet (an
/// unconfirmed account hitting sign-in), so the first resend is allowed
/// immediately.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingConfirmation {
    pub email: String,
    pub last_sent_at: Option<DateTime<Utc>>,
}

/// Transient informational message, distinct from an error by identity
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub text: String,
    ttl: u32,
}

/// Identity of an issued operation: the step it was issued for plus a
/// monotonically increasing sequence number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpTag {
    step: Step,
    seq: u64,
}

/// Network work requested by the machine
#[derive(Debug, Clone, PartialEq)]
pub enum OpRequest {
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        email: String,
        password: String,
        first_name: String,
        last_name: String,
    },
    Confirm {
        email: String,
        code: String,
    },
    Resend {
        email: String,
    },
    ResetRequest {
        email: String,
    },
    ResetSubmit {
        email: String,
        code: String,
        new_password: String,
    },
}

/// An operation the driver must run against the identity gateway
#[derive(Debug, Clone, PartialEq)]
pub struct PendingOp {
    pub tag: OpTag,
    pub request: OpRequest,
}

/// Completed-operation result fed back into the machine
#[derive(Debug, Clone)]
pub enum OpOutcome {
    SignIn(Result<SignInOutcome, AuthError>),
    SignUp(Result<SignUpOutcome, AuthError>),
    Confirm(Result<(), AuthError>),
    Resend(Result<ResendReceipt, AuthError>),
    ResetRequest(Result<(), AuthError>),
    ResetSubmit(Result<(), AuthError>),
}

/// Externally visible outcome of a resolution
#[derive(Debug, Clone, PartialEq)]
pub enum FlowEvent {
    /// State was updated; nothing for the caller to act on
    Idle,
    /// Sign-in completed with a full session
    SignedIn { user_id: String },
    /// The account needs email verification before a session is issued
    VerificationRequired,
    /// Email confirmation succeeded
    Verified,
    /// The outcome arrived for a step that is no longer active
    Discarded,
}

/// The flow state machine
#[derive(Debug, Clone)]
pub struct AuthFlow {
    step: Step,
    draft: RegistrationDraft,
    credentials: SignInInput,
    reset_code: String,
    reset_password: String,
    pending_confirmation: Option<PendingConfirmation>,
    store: TokenStore,
    error: Option<String>,
    notice: Option<Notice>,
    loading: bool,
    seq: u64,
    resend_cooldown: u32,
}

impl Default for AuthFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthFlow {
    /// Start a fresh flow at the sign-in step
    pub fn new() -> Self {
        Self {
            step: Step::SignIn,
            draft: RegistrationDraft::default(),
            credentials: SignInInput::default(),
            reset_code: String::new(),
            reset_password: String::new(),
            pending_confirmation: None,
            store: TokenStore::new(),
            error: None,
            notice: None,
            loading: false,
            seq: 0,
            resend_cooldown: 0,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_ref().map(|n| n.text.as_str())
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn draft(&self) -> &RegistrationDraft {
        &self.draft
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut TokenStore {
        &mut self.store
    }

    /// Remaining seconds of the resend countdown, for display
    pub fn resend_cooldown(&self) -> u32 {
        self.resend_cooldown
    }

    /// Navigate to a step
    ///
    /// Errors are scoped to the step that produced them, so navigation always
    /// clears the current one. Bumping the sequence invalidates any in-flight
    /// operation: its late resolution is discarded rather than applied to the
    /// now-inactive step.
    pub fn go_to_step(&mut self, step: Step) {
        self.error = None;
        self.loading = false;
        self.seq += 1;
        self.step = step;
        if step != Step::Verify {
            // Leaving the verify flow abandons the pending confirmation.
            self.pending_confirmation = None;
            self.resend_cooldown = 0;
        }
    }

    /// Enter the forgot-password sub-flow; the sign-up draft stays intact
    pub fn go_to_forgot_password(&mut self) {
        self.go_to_step(Step::ForgotPassword);
    }

    pub fn set_sign_in_email(&mut self, email: impl Into<String>) {
        self.credentials.email = email.into();
    }

    pub fn set_sign_in_password(&mut self, password: impl Into<String>) {
        self.credentials.password = password.into();
    }

    pub fn set_first_name(&mut self, value: impl Into<String>) {
        self.draft.first_name = value.into();
    }

    pub fn set_last_name(&mut self, value: impl Into<String>) {
        self.draft.last_name = value.into();
    }

    pub fn set_email(&mut self, value: impl Into<String>) {
        self.draft.email = value.into();
    }

    pub fn set_password(&mut self, value: impl Into<String>) {
        self.draft.password = value.into();
    }

    pub fn set_confirm_password(&mut self, value: impl Into<String>) {
        self.draft.confirm_password = value.into();
    }

    /// Store verification-code input, stripping non-digits and truncating
    /// to six characters. Malformed paste input is sanitized, never an error.
    pub fn set_verification_code(&mut self, input: &str) {
        self.draft.verification_code = sanitize_code(input);
    }

    pub fn set_reset_code(&mut self, input: &str) {
        self.reset_code = sanitize_code(input);
    }

    pub fn set_reset_password(&mut self, value: impl Into<String>) {
        self.reset_password = value.into();
    }

    /// Current password policy evaluation, recomputed per keystroke
    pub fn password_checks(&self) -> PasswordChecks {
        PasswordChecks::evaluate(&self.draft.password, &self.draft.confirm_password)
    }

    /// Verification submission is enabled only at exactly six digits
    pub fn can_submit_verification(&self) -> bool {
        self.draft.verification_code.len() == VERIFICATION_CODE_LENGTH
    }

    /// Seconds left before another resend may be issued
    pub fn resend_cooldown_remaining(&self, now: DateTime<Utc>) -> i64 {
        let Some(pending) = &self.pending_confirmation else {
            return 0;
        };
        let Some(last_sent_at) = pending.last_sent_at else {
            return 0;
        };
        let elapsed = now.signed_duration_since(last_sent_at);
        (RESEND_COOLDOWN_SECONDS - elapsed.num_seconds()).max(0)
    }

    /// One-second UI tick: advances the resend countdown and expires the
    /// transient notice. Independent of any in-flight network call.
    pub fn tick(&mut self) {
        if self.resend_cooldown > 0 {
            self.resend_cooldown -= 1;
        }
        if let Some(notice) = &mut self.notice {
            if notice.ttl == 0 {
                self.notice = None;
            } else {
                notice.ttl -= 1;
            }
        }
    }

    fn begin(&mut self, request: OpRequest) -> PendingOp {
        self.error = None;
        self.loading = true;
        self.seq += 1;
        PendingOp {
            tag: OpTag {
                step: self.step,
                seq: self.seq,
            },
            request,
        }
    }

    /// Request a sign-in with the entered credentials
    pub fn begin_sign_in(&mut self) -> Option<PendingOp> {
        if self.loading {
            return None;
        }
        if self.credentials.email.is_empty() || self.credentials.password.is_empty() {
            self.error = Some("Enter your email and password.".to_string());
            return None;
        }
        Some(self.begin(OpRequest::SignIn {
            email: self.credentials.email.clone(),
            password: self.credentials.password.clone(),
        }))
    }

    /// Request a sign-up with the draft
    ///
    /// Blocked client-side until the password policy holds; the server-side
    /// call remains the authoritative check.
    pub fn begin_sign_up(&mut self) -> Option<PendingOp> {
        if self.loading || !self.password_checks().all_requirements_met() {
            return None;
        }
        Some(self.begin(OpRequest::SignUp {
            email: self.draft.email.clone(),
            password: self.draft.password.clone(),
            first_name: self.draft.first_name.clone(),
            last_name: self.draft.last_name.clone(),
        }))
    }

    /// Request a confirmation of the entered verification code
    pub fn begin_verification(&mut self) -> Option<PendingOp> {
        if self.loading || !self.can_submit_verification() {
            return None;
        }
        let email = self.pending_confirmation.as_ref()?.email.clone();
        Some(self.begin(OpRequest::Confirm {
            email,
            code: self.draft.verification_code.clone(),
        }))
    }

    /// Request a confirmation-code resend
    ///
    /// Refused locally, without a network call, while the cooldown since the
    /// last successful send has not elapsed. The provider's own rate limit is
    /// only the backstop.
    pub fn begin_resend(&mut self, now: DateTime<Utc>) -> Option<PendingOp> {
        if self.loading || self.resend_cooldown_remaining(now) > 0 {
            return None;
        }
        let email = self.pending_confirmation.as_ref()?.email.clone();
        Some(self.begin(OpRequest::Resend { email }))
    }

    /// Request a password-reset code for the sign-in email
    pub fn begin_reset_request(&mut self) -> Option<PendingOp> {
        if self.loading {
            return None;
        }
        if self.credentials.email.is_empty() {
            self.error = Some("Enter your email first.".to_string());
            return None;
        }
        Some(self.begin(OpRequest::ResetRequest {
            email: self.credentials.email.clone(),
        }))
    }

    /// Submit the reset code and the new password
    pub fn begin_reset_submit(&mut self) -> Option<PendingOp> {
        if self.loading
            || self.reset_code.len() != VERIFICATION_CODE_LENGTH
            || self.reset_password.is_empty()
        {
            return None;
        }
        Some(self.begin(OpRequest::ResetSubmit {
            email: self.credentials.email.clone(),
            code: self.reset_code.clone(),
            new_password: self.reset_password.clone(),
        }))
    }

    /// Apply a completed operation
    ///
    /// Outcomes whose tag no longer matches the machine are discarded: the
    /// user navigated away or a newer operation superseded this one. Every
    /// non-discarded resolution clears `loading` exactly once, so a failure
    /// can never leave the UI stuck in a loading state.
    pub fn resolve(&mut self, tag: OpTag, outcome: OpOutcome, now: DateTime<Utc>) -> FlowEvent {
        if tag.seq != self.seq || tag.step != self.step || !self.loading {
            return FlowEvent::Discarded;
        }
        self.loading = false;

        match outcome {
            OpOutcome::SignIn(Ok(outcome)) => self.apply_sign_in(outcome),
            OpOutcome::SignIn(Err(e)) => {
                // Surface the gateway's message directly for sign-in.
                self.error = Some(step_error(&e));
                FlowEvent::Idle
            }
            OpOutcome::SignUp(Ok(outcome)) => self.apply_sign_up(outcome, now),
            OpOutcome::SignUp(Err(e)) => {
                self.error = Some(step_error(&e));
                FlowEvent::Idle
            }
            OpOutcome::Confirm(Ok(())) => {
                self.pending_confirmation = None;
                self.draft = RegistrationDraft::default();
                self.step = Step::Complete;
                FlowEvent::Verified
            }
            OpOutcome::Confirm(Err(e)) => {
                self.error = Some(verification_error(&e));
                FlowEvent::Idle
            }
            OpOutcome::Resend(Ok(receipt)) => {
                if let Some(pending) = &mut self.pending_confirmation {
                    pending.last_sent_at = Some(now);
                }
                self.resend_cooldown = RESEND_COOLDOWN_SECONDS as u32;
                self.notice = Some(Notice {
                    text: format!("A new code was sent to {}.", receipt.destination),
                    ttl: NOTICE_TTL_TICKS,
                });
                FlowEvent::Idle
            }
            OpOutcome::Resend(Err(e)) => {
                self.error = Some(verification_error(&e));
                FlowEvent::Idle
            }
            OpOutcome::ResetRequest(Ok(())) => {
                self.step = Step::ResetPassword;
                self.notice = Some(Notice {
                    text: "A reset code was sent to your email.".to_string(),
                    ttl: NOTICE_TTL_TICKS,
                });
                FlowEvent::Idle
            }
            OpOutcome::ResetRequest(Err(e)) => {
                self.error = Some(step_error(&e));
                FlowEvent::Idle
            }
            OpOutcome::ResetSubmit(Ok(())) => {
                self.reset_code.clear();
                self.reset_password.clear();
                self.step = Step::SignIn;
                self.notice = Some(Notice {
                    text: "Password updated. Sign in with your new password.".to_string(),
                    ttl: NOTICE_TTL_TICKS,
                });
                FlowEvent::Idle
            }
            OpOutcome::ResetSubmit(Err(e)) => {
                self.error = Some(verification_error(&e));
                FlowEvent::Idle
            }
        }
    }

    fn apply_sign_in(&mut self, outcome: SignInOutcome) -> FlowEvent {
        if outcome.needs_verification {
            // Credentials accepted but the account is unconfirmed. No code
            // was sent just now, so the first resend is allowed immediately.
            self.pending_confirmation = Some(PendingConfirmation {
                email: self.credentials.email.clone(),
                last_sent_at: None,
            });
            self.step = Step::Verify;
            return FlowEvent::VerificationRequired;
        }

        match outcome.session {
            Some(session) => {
                self.store.replace(session);
                self.draft = RegistrationDraft::default();
                self.credentials = SignInInput::default();
                self.step = Step::Complete;
                FlowEvent::SignedIn {
                    user_id: outcome.user_id,
                }
            }
            None => {
                // A complete sign-in with no session is a broken contract.
                self.error = Some(GENERIC_ERROR.to_string());
                FlowEvent::Idle
            }
        }
    }

    fn apply_sign_up(&mut self, outcome: SignUpOutcome, now: DateTime<Utc>) -> FlowEvent {
        if outcome.confirmed {
            // Provider confirmed at sign-up, nothing left to verify.
            self.draft = RegistrationDraft::default();
            self.step = Step::Complete;
            return FlowEvent::Verified;
        }

        // The provider delivered the initial code as part of sign-up.
        self.pending_confirmation = Some(PendingConfirmation {
            email: self.draft.email.clone(),
            last_sent_at: Some(now),
        });
        self.resend_cooldown = RESEND_COOLDOWN_SECONDS as u32;
        self.step = Step::Verify;
        FlowEvent::VerificationRequired
    }
}

/// Keep only digits, truncated to the code length
fn sanitize_code(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_digit())
        .take(VERIFICATION_CODE_LENGTH)
        .collect()
}

/// Step-scoped message for a gateway failure
///
/// Taxonomy kinds carry user-presentable copy; transport failures never
/// leak their internals to the UI.
fn step_error(error: &AuthError) -> String {
    match error {
        AuthError::GatewayUnavailable(_) => GENERIC_ERROR.to_string(),
        other => other.to_string(),
    }
}

/// User-facing copy for verification failures, with a generic fallback
fn verification_error(error: &AuthError) -> String {
    match error {
        AuthError::CodeMismatch => INVALID_CODE_ERROR.to_string(),
        AuthError::CodeExpired => EXPIRED_CODE_ERROR.to_string(),
        AuthError::RateLimited => RATE_LIMITED_ERROR.to_string(),
        _ => GENERIC_ERROR.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flow_at_verify(last_sent_at: Option<DateTime<Utc>>) -> AuthFlow {
        let mut flow = AuthFlow::new();
        flow.go_to_step(Step::Verify);
        flow.pending_confirmation = Some(PendingConfirmation {
            email: "a@b.com".to_string(),
            last_sent_at,
        });
        flow
    }

    #[test]
    fn test_verification_code_sanitized() {
        let mut flow = AuthFlow::new();
        flow.set_verification_code("12a3 45");
        assert_eq!(flow.draft().verification_code, "12345");
        assert!(!flow.can_submit_verification());

        flow.set_verification_code("12a3 456");
        assert_eq!(flow.draft().verification_code, "123456");
        assert!(flow.can_submit_verification());

        // Over-long paste input is truncated, not rejected.
        flow.set_verification_code("99887766554433");
        assert_eq!(flow.draft().verification_code, "998877");
    }

    #[test]
    fn test_go_to_step_clears_error() {
        let mut flow = AuthFlow::new();
        flow.error = Some("bad credentials".to_string());
        flow.go_to_step(Step::Welcome);
        assert_eq!(flow.error(), None);
        assert_eq!(flow.step(), Step::Welcome);
    }

    #[test]
    fn test_stale_resolution_is_discarded() {
        let now = Utc::now();
        let mut flow = AuthFlow::new();
        flow.set_sign_in_email("a@b.com");
        flow.set_sign_in_password("Abcdefg1");

        let op = flow.begin_sign_in().expect("sign-in should start");
        assert!(flow.is_loading());

        // User navigates away before the response lands.
        flow.go_to_step(Step::Welcome);
        assert!(!flow.is_loading());

        let event = flow.resolve(
            op.tag,
            OpOutcome::SignIn(Err(AuthError::TokenInvalid)),
            now,
        );
        assert_eq!(event, FlowEvent::Discarded);
        assert_eq!(flow.error(), None);
        assert_eq!(flow.step(), Step::Welcome);
    }

    #[test]
    fn test_superseded_operation_is_discarded() {
        let now = Utc::now();
        let mut flow = AuthFlow::new();
        flow.set_sign_in_email("a@b.com");
        flow.set_sign_in_password("Abcdefg1");

        let first = flow.begin_sign_in().expect("first sign-in should start");
        // The step did not change, but a newer operation superseded this one.
        flow.loading = false;
        let _second = flow.begin_sign_in().expect("second sign-in should start");

        let event = flow.resolve(
            first.tag,
            OpOutcome::SignIn(Err(AuthError::TokenInvalid)),
            now,
        );
        assert_eq!(event, FlowEvent::Discarded);
        assert!(flow.is_loading());
    }

    #[test]
    fn test_resend_rejected_locally_within_cooldown() {
        let now = Utc::now();
        let mut flow = flow_at_verify(Some(now - Duration::seconds(30)));
        assert!(flow.begin_resend(now).is_none());
        assert_eq!(flow.resend_cooldown_remaining(now), 30);
    }

    #[test]
    fn test_resend_allowed_after_cooldown() {
        let now = Utc::now();
        let mut flow = flow_at_verify(Some(now - Duration::seconds(61)));
        assert!(flow.begin_resend(now).is_some());
    }

    #[test]
    fn test_first_resend_allowed_when_no_code_was_sent() {
        let now = Utc::now();
        let mut flow = flow_at_verify(None);
        assert!(flow.begin_resend(now).is_some());
    }

    #[test]
    fn test_resend_success_starts_countdown_and_notice() {
        let now = Utc::now();
        let mut flow = flow_at_verify(None);
        let op = flow.begin_resend(now).expect("resend should start");

        let event = flow.resolve(
            op.tag,
            OpOutcome::Resend(Ok(ResendReceipt {
                delivery_channel: "EMAIL".to_string(),
                destination: "a***@b.com".to_string(),
            })),
            now,
        );
        assert_eq!(event, FlowEvent::Idle);
        assert_eq!(flow.resend_cooldown(), 60);
        assert_eq!(flow.resend_cooldown_remaining(now), 60);
        // The confirmation text lives in the notice field, not the error one.
        assert!(flow.notice().is_some_and(|n| n.contains("a***@b.com")));
        assert_eq!(flow.error(), None);

        flow.tick();
        assert_eq!(flow.resend_cooldown(), 59);
    }

    #[test]
    fn test_notice_auto_clears_after_ttl() {
        let now = Utc::now();
        let mut flow = flow_at_verify(None);
        let op = flow.begin_resend(now).expect("resend should start");
        flow.resolve(
            op.tag,
            OpOutcome::Resend(Ok(ResendReceipt {
                delivery_channel: "EMAIL".to_string(),
                destination: "a***@b.com".to_string(),
            })),
            now,
        );

        for _ in 0..=NOTICE_TTL_TICKS {
            assert!(flow.notice().is_some());
            flow.tick();
        }
        assert_eq!(flow.notice(), None);
    }

    #[test]
    fn test_sign_up_blocked_until_policy_met() {
        let mut flow = AuthFlow::new();
        flow.go_to_step(Step::SignupPassword);
        flow.set_email("a@b.com");
        flow.set_password("weak");
        flow.set_confirm_password("weak");
        assert!(flow.begin_sign_up().is_none());

        flow.set_password("Abcdefg1");
        flow.set_confirm_password("Abcdefg1");
        assert!(flow.begin_sign_up().is_some());
    }

    #[test]
    fn test_sign_up_success_transitions_to_verify() {
        let now = Utc::now();
        let mut flow = AuthFlow::new();
        flow.go_to_step(Step::SignupPassword);
        flow.set_email("a@b.com");
        flow.set_password("Abcdefg1");
        flow.set_confirm_password("Abcdefg1");

        let op = flow.begin_sign_up().expect("sign-up should start");
        let event = flow.resolve(
            op.tag,
            OpOutcome::SignUp(Ok(SignUpOutcome {
                user_id: "user-1".to_string(),
                confirmed: false,
            })),
            now,
        );
        assert_eq!(event, FlowEvent::VerificationRequired);
        assert_eq!(flow.step(), Step::Verify);
        // The sign-up delivery counts as the last send.
        assert_eq!(flow.resend_cooldown_remaining(now), 60);
        assert!(flow.begin_resend(now).is_none());
    }

    #[test]
    fn test_sign_in_needs_verification_goes_to_verify() {
        let now = Utc::now();
        let mut flow = AuthFlow::new();
        flow.set_sign_in_email("a@b.com");
        flow.set_sign_in_password("Abcdefg1");

        let op = flow.begin_sign_in().expect("sign-in should start");
        let event = flow.resolve(
            op.tag,
            OpOutcome::SignIn(Ok(SignInOutcome {
                user_id: "user-1".to_string(),
                session: None,
                needs_verification: true,
            })),
            now,
        );
        assert_eq!(event, FlowEvent::VerificationRequired);
        assert_eq!(flow.step(), Step::Verify);
        assert!(!flow.is_loading());
    }

    #[test]
    fn test_sign_in_success_stores_session_and_clears_draft() {
        let now = Utc::now();
        let mut flow = AuthFlow::new();
        flow.set_first_name("Ada");
        flow.set_sign_in_email("a@b.com");
        flow.set_sign_in_password("Abcdefg1");

        let session = Session::issued(
            "a".into(),
            "i".into(),
            "r".into(),
            now,
            3600,
            "Bearer".into(),
        );
        let op = flow.begin_sign_in().expect("sign-in should start");
        let event = flow.resolve(
            op.tag,
            OpOutcome::SignIn(Ok(SignInOutcome {
                user_id: "user-1".to_string(),
                session: Some(session),
                needs_verification: false,
            })),
            now,
        );
        assert_eq!(
            event,
            FlowEvent::SignedIn {
                user_id: "user-1".to_string()
            }
        );
        assert_eq!(flow.step(), Step::Complete);
        assert!(flow.store().is_valid(now));
        assert_eq!(flow.draft(), &RegistrationDraft::default());
    }

    #[test]
    fn test_sign_in_failure_surfaces_message_and_clears_loading() {
        let now = Utc::now();
        let mut flow = AuthFlow::new();
        flow.set_sign_in_email("a@b.com");
        flow.set_sign_in_password("nope");

        let op = flow.begin_sign_in().expect("sign-in should start");
        let event = flow.resolve(
            op.tag,
            OpOutcome::SignIn(Err(AuthError::AccountNotFound)),
            now,
        );
        assert_eq!(event, FlowEvent::Idle);
        assert!(!flow.is_loading());
        assert_eq!(flow.error(), Some(AuthError::AccountNotFound.to_string().as_str()));
        assert_eq!(flow.step(), Step::SignIn);
    }

    #[test]
    fn test_transport_failure_shows_generic_copy() {
        let now = Utc::now();
        let mut flow = AuthFlow::new();
        flow.set_sign_in_email("a@b.com");
        flow.set_sign_in_password("Abcdefg1");

        let op = flow.begin_sign_in().expect("sign-in should start");
        flow.resolve(
            op.tag,
            OpOutcome::SignIn(Err(AuthError::GatewayUnavailable(
                "connection refused".to_string(),
            ))),
            now,
        );
        assert_eq!(flow.error(), Some(GENERIC_ERROR));
    }

    #[test]
    fn test_verification_error_copy_mapping() {
        assert_eq!(verification_error(&AuthError::CodeMismatch), INVALID_CODE_ERROR);
        assert_eq!(verification_error(&AuthError::CodeExpired), EXPIRED_CODE_ERROR);
        assert_eq!(verification_error(&AuthError::RateLimited), RATE_LIMITED_ERROR);
        assert_eq!(verification_error(&AuthError::AccountNotFound), GENERIC_ERROR);
    }

    #[test]
    fn test_forgot_password_preserves_draft() {
        let mut flow = AuthFlow::new();
        flow.go_to_step(Step::SignupEmail);
        flow.set_first_name("Ada");
        flow.set_email("ada@b.com");

        flow.go_to_step(Step::SignIn);
        flow.go_to_forgot_password();
        assert_eq!(flow.step(), Step::ForgotPassword);
        assert_eq!(flow.draft().first_name, "Ada");
        assert_eq!(flow.draft().email, "ada@b.com");
    }

    #[test]
    fn test_confirmation_success_completes_flow() {
        let now = Utc::now();
        let mut flow = flow_at_verify(Some(now));
        flow.set_verification_code("123456");

        let op = flow.begin_verification().expect("confirm should start");
        let event = flow.resolve(op.tag, OpOutcome::Confirm(Ok(())), now);
        assert_eq!(event, FlowEvent::Verified);
        assert_eq!(flow.step(), Step::Complete);
        assert!(flow.pending_confirmation.is_none());
    }
}
