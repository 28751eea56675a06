//! Session holder and phone/OTP login flow
//!
//! The session lives in [`SessionState`] and in [`ClientStorage`]. Storage
//! is only touched from effects, so it catches up with the state once the
//! action's effects have run.

use crate::api::{BookingApi, PhoneNumber, ProfileEdit};
use crate::error::BookingError;
use crate::storage::ClientStorage;
use crate::types::{Session, parse_date_of_birth};
use matchday_core::{SmallVec, async_effect, effect::Effect, reducer::Reducer, smallvec};
use std::sync::Arc;

/// Minimum number of digits in a phone number
pub const MIN_PHONE_DIGITS: usize = 10;
/// Length of the one-time passcode
pub const CODE_LENGTH: usize = 4;

/// Where the login flow is
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoginPhase {
    /// Waiting for a phone number
    #[default]
    EnterPhone,
    /// Code sent, waiting for it
    EnterCode,
    /// Logged in without a display name
    CompleteProfile,
    /// Logged in
    Complete,
}

/// Session state
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    /// Current session
    pub session: Option<Session>,
    /// Login phase
    pub phase: LoginPhase,
    /// Phone the code was sent to
    pub pending_phone: Option<PhoneNumber>,
    /// A request is in flight
    pub loading: bool,
    /// Last error
    pub error: Option<BookingError>,
    /// The session was revoked by the backend; show the landing page
    pub redirect_to_landing: bool,
}

impl SessionState {
    /// Whether a session is held
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.session.is_some()
    }

    fn signed_out(&mut self) {
        self.session = None;
        self.phase = LoginPhase::EnterPhone;
        self.pending_phone = None;
        self.loading = false;
        self.error = None;
    }
}

/// Session actions
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionAction {
    /// Rehydrate from storage
    Restore,
    /// Storage read finished
    Restored {
        /// Stored session, if any
        session: Option<Session>,
    },
    /// Ask for an OTP
    RequestCode {
        /// Phone number
        phone: String,
        /// Dialling code
        country_code: String,
    },
    /// OTP dispatched
    CodeSent {
        /// Where it went
        phone: PhoneNumber,
    },
    /// OTP dispatch failed
    CodeRequestFailed {
        /// Cause
        error: BookingError,
    },
    /// Exchange an OTP for a session
    VerifyCode {
        /// Phone number
        phone: String,
        /// Dialling code
        country_code: String,
        /// Passcode
        code: String,
    },
    /// Session created and stored
    Verified {
        /// New session
        session: Session,
    },
    /// Verification failed
    VerificationFailed {
        /// Cause
        error: BookingError,
    },
    /// Save a display name
    SubmitDisplayName {
        /// Name
        display_name: String,
    },
    /// Display name saved
    ProfileSaved {
        /// Updated session
        session: Session,
    },
    /// Display name not saved; login completes anyway
    ProfileSaveFailed {
        /// Cause
        error: BookingError,
    },
    /// Change the signed-in user's name and date of birth
    EditProfile {
        /// Display name
        first_name: String,
        /// `DD-MM-YYYY` or `YYYY-MM-DD`; blank leaves it unset
        dob: String,
    },
    /// Profile edit rejected; the session keeps the old values
    ProfileEditFailed {
        /// Cause
        error: BookingError,
    },
    /// Finish login without a display name
    SkipProfile,
    /// Sign out
    Logout,
    /// The backend rejected the token
    Unauthorized,
}

/// Session dependencies
#[derive(Clone)]
pub struct SessionEnvironment {
    /// Backend
    pub api: Arc<dyn BookingApi>,
    /// Token and profile
    pub storage: ClientStorage,
}

impl std::fmt::Debug for SessionEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionEnvironment").finish_non_exhaustive()
    }
}

/// Session reducer
#[derive(Clone, Debug, Default)]
pub struct SessionReducer;

impl SessionReducer {
    /// Create a session reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Send `edit`, then apply it to `session` and the cached profile
    fn save_profile(
        mut session: Session,
        edit: ProfileEdit,
        env: &SessionEnvironment,
        failed: fn(BookingError) -> SessionAction,
    ) -> Effect<SessionAction> {
        let api = Arc::clone(&env.api);
        let storage = env.storage.clone();

        async_effect! {
            if let Err(error) = api.edit_profile(edit.clone()).await {
                return Some(failed(error));
            }
            session.display_name = Some(edit.first_name);
            session.dob = edit.dob;
            if let Err(error) = storage.save_profile(&session.profile()) {
                tracing::warn!(%error, "Failed to cache updated profile");
            }
            Some(SessionAction::ProfileSaved { session })
        }
    }

    fn clear_storage(env: &SessionEnvironment) -> Effect<SessionAction> {
        let storage = env.storage.clone();
        async_effect! {
            storage.clear_session();
            None
        }
    }
}

/// Normalize and validate a phone number
///
/// # Errors
///
/// Returns [`BookingError::Validation`] unless the phone has at least
/// [`MIN_PHONE_DIGITS`] digits and both fields are digits only
pub fn validate_phone(phone: &str, country_code: &str) -> Result<PhoneNumber, BookingError> {
    let phone = phone.trim();
    let country_code = country_code.trim().trim_start_matches('+');

    if !phone.chars().all(|c| c.is_ascii_digit()) || phone.len() < MIN_PHONE_DIGITS {
        return Err(BookingError::Validation(
            "Please enter a valid phone number".to_string(),
        ));
    }
    if country_code.is_empty() || !country_code.chars().all(|c| c.is_ascii_digit()) {
        return Err(BookingError::Validation(
            "Please select a valid country code".to_string(),
        ));
    }

    Ok(PhoneNumber {
        phone: phone.to_string(),
        country_code: country_code.to_string(),
    })
}

/// Validate a profile edit
///
/// # Errors
///
/// Returns [`BookingError::Validation`] for a blank name or a date of birth
/// that is neither `DD-MM-YYYY` nor `YYYY-MM-DD`
pub fn validate_profile(first_name: &str, dob: &str) -> Result<ProfileEdit, BookingError> {
    let first_name = first_name.trim();
    if first_name.is_empty() {
        return Err(BookingError::Validation("Please enter your name".to_string()));
    }
    let dob = if dob.trim().is_empty() {
        None
    } else {
        Some(parse_date_of_birth(dob).ok_or_else(|| {
            BookingError::Validation("Please enter a valid date of birth".to_string())
        })?)
    };
    Ok(ProfileEdit {
        first_name: first_name.to_string(),
        dob,
    })
}

/// Validate a one-time passcode
///
/// # Errors
///
/// Returns [`BookingError::Validation`] unless the code is exactly
/// [`CODE_LENGTH`] digits
pub fn validate_code(code: &str) -> Result<String, BookingError> {
    let code = code.trim();
    if code.len() == CODE_LENGTH && code.chars().all(|c| c.is_ascii_digit()) {
        Ok(code.to_string())
    } else {
        Err(BookingError::Validation(format!(
            "Please enter the {CODE_LENGTH}-digit code"
        )))
    }
}

impl Reducer for SessionReducer {
    type State = SessionState;
    type Action = SessionAction;
    type Environment = SessionEnvironment;

    #[allow(clippy::too_many_lines)] // one arm per login transition
    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            SessionAction::Restore => {
                let storage = env.storage.clone();
                smallvec![async_effect! {
                    Some(SessionAction::Restored { session: storage.load_session() })
                }]
            },

            SessionAction::Restored { session } => {
                if state.session.is_none() {
                    tracing::debug!(restored = session.is_some(), "Session restored");
                    state.phase = if session.is_some() {
                        LoginPhase::Complete
                    } else {
                        LoginPhase::EnterPhone
                    };
                    state.session = session;
                }
                smallvec![Effect::None]
            },

            SessionAction::RequestCode {
                phone,
                country_code,
            } => {
                let phone = match validate_phone(&phone, &country_code) {
                    Ok(phone) => phone,
                    Err(error) => {
                        state.error = Some(error);
                        return smallvec![Effect::None];
                    },
                };
                state.loading = true;
                state.error = None;

                let api = Arc::clone(&env.api);
                smallvec![async_effect! {
                    match api.request_code(phone.clone()).await {
                        Ok(()) => Some(SessionAction::CodeSent { phone }),
                        Err(error) => Some(SessionAction::CodeRequestFailed { error }),
                    }
                }]
            },

            SessionAction::CodeSent { phone } => {
                tracing::info!(country_code = %phone.country_code, "OTP sent");
                state.loading = false;
                state.phase = LoginPhase::EnterCode;
                state.pending_phone = Some(phone);
                smallvec![Effect::None]
            },

            SessionAction::CodeRequestFailed { error } => {
                tracing::warn!(%error, "OTP request failed");
                state.loading = false;
                state.error = Some(error);
                smallvec![Effect::None]
            },

            SessionAction::VerifyCode {
                phone,
                country_code,
                code,
            } => {
                let validated = validate_phone(&phone, &country_code)
                    .and_then(|phone| validate_code(&code).map(|code| (phone, code)));
                let (phone, code) = match validated {
                    Ok(pair) => pair,
                    Err(error) => {
                        state.error = Some(error);
                        return smallvec![Effect::None];
                    },
                };
                state.loading = true;
                state.error = None;

                let api = Arc::clone(&env.api);
                let storage = env.storage.clone();
                smallvec![async_effect! {
                    let session = match api.verify_code(phone, code).await {
                        Ok(session) => session,
                        Err(error) => return Some(SessionAction::VerificationFailed { error }),
                    };
                    match storage.save_session(&session) {
                        Ok(()) => Some(SessionAction::Verified { session }),
                        Err(error) => {
                            storage.clear_session();
                            Some(SessionAction::VerificationFailed { error })
                        },
                    }
                }]
            },

            SessionAction::Verified { session } => {
                tracing::info!(user_id = %session.user_id, "Logged in");
                state.loading = false;
                state.error = None;
                state.redirect_to_landing = false;
                state.pending_phone = None;
                state.phase = if session.needs_profile() {
                    LoginPhase::CompleteProfile
                } else {
                    LoginPhase::Complete
                };
                state.session = Some(session);
                smallvec![Effect::None]
            },

            SessionAction::VerificationFailed { error } => {
                tracing::warn!(%error, "OTP verification failed");
                state.loading = false;
                state.error = Some(error);
                smallvec![Effect::None]
            },

            SessionAction::SubmitDisplayName { display_name } => {
                let display_name = display_name.trim().to_string();
                if display_name.is_empty() {
                    state.error = Some(BookingError::Validation(
                        "Please enter your name".to_string(),
                    ));
                    return smallvec![Effect::None];
                }
                let Some(session) = state
                    .session
                    .clone()
                    .filter(|_| state.phase == LoginPhase::CompleteProfile)
                else {
                    return smallvec![Effect::None];
                };
                state.loading = true;
                state.error = None;

                let edit = ProfileEdit {
                    first_name: display_name,
                    dob: session.dob,
                };
                smallvec![Self::save_profile(session, edit, env, |error| {
                    SessionAction::ProfileSaveFailed { error }
                })]
            },

            SessionAction::EditProfile { first_name, dob } => {
                let Some(session) = state.session.clone() else {
                    tracing::debug!("Ignoring profile edit without a session");
                    return smallvec![Effect::None];
                };
                let edit = match validate_profile(&first_name, &dob) {
                    Ok(edit) => edit,
                    Err(error) => {
                        state.error = Some(error);
                        return smallvec![Effect::None];
                    },
                };
                state.loading = true;
                state.error = None;

                smallvec![Self::save_profile(session, edit, env, |error| {
                    SessionAction::ProfileEditFailed { error }
                })]
            },

            SessionAction::ProfileSaved { session } => {
                let same_user = state
                    .session
                    .as_ref()
                    .is_some_and(|current| current.user_id == session.user_id);
                if same_user {
                    tracing::info!(user_id = %session.user_id, "Profile saved");
                    state.loading = false;
                    state.error = None;
                    state.phase = LoginPhase::Complete;
                    state.session = Some(session);
                }
                smallvec![Effect::None]
            },

            SessionAction::ProfileEditFailed { error } => {
                tracing::warn!(%error, "Profile edit failed");
                state.loading = false;
                state.error = Some(error);
                smallvec![Effect::None]
            },

            SessionAction::ProfileSaveFailed { error } => {
                tracing::warn!(%error, "Failed to save display name, completing login");
                state.loading = false;
                if state.is_authenticated() {
                    state.phase = LoginPhase::Complete;
                }
                smallvec![Effect::None]
            },

            SessionAction::SkipProfile => {
                if state.phase == LoginPhase::CompleteProfile {
                    state.phase = LoginPhase::Complete;
                }
                smallvec![Effect::None]
            },

            SessionAction::Logout => {
                tracing::info!("Logging out");
                state.signed_out();
                state.redirect_to_landing = false;
                smallvec![Self::clear_storage(env)]
            },

            SessionAction::Unauthorized => {
                tracing::warn!("Session revoked by backend");
                state.signed_out();
                state.redirect_to_landing = true;
                smallvec![Self::clear_storage(env)]
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)] // Test code
mod tests {
    use super::*;
    use crate::api::MockBookingApi;
    use crate::api::mock::endpoint;
    use chrono::NaiveDate;
    use matchday_testing::{ReducerTest, assertions, helpers::resolve_effects};

    fn session(display_name: Option<&str>) -> Session {
        Session {
            user_id: "u1".into(),
            phone: "9876543210".into(),
            country_code: "91".into(),
            display_name: display_name.map(str::to_string),
            auth_token: "token-1".into(),
            email: None,
            image: None,
            dob: None,
        }
    }

    fn env_with(api: Arc<MockBookingApi>) -> SessionEnvironment {
        SessionEnvironment {
            api,
            storage: ClientStorage::in_memory(),
        }
    }

    fn env() -> SessionEnvironment {
        env_with(Arc::new(MockBookingApi::new()))
    }

    #[test]
    fn test_phone_validation() {
        assert!(validate_phone("98765", "91").is_err());
        assert!(validate_phone("98765abcde", "91").is_err());
        assert!(validate_phone("9876543210", "").is_err());
        assert_eq!(
            validate_phone(" 9876543210 ", "+91").unwrap(),
            PhoneNumber {
                phone: "9876543210".into(),
                country_code: "91".into(),
            }
        );
        assert!(validate_code("12a4").is_err());
        assert!(validate_code("12345").is_err());
        assert_eq!(validate_code("1234").unwrap(), "1234");
    }

    #[test]
    fn test_short_phone_never_reaches_backend() {
        ReducerTest::new(SessionReducer::new())
            .with_env(env())
            .given_state(SessionState::default())
            .when_action(SessionAction::RequestCode {
                phone: "12345".into(),
                country_code: "91".into(),
            })
            .then_state(|state| {
                assert!(matches!(state.error, Some(BookingError::Validation(_))));
                assert_eq!(state.phase, LoginPhase::EnterPhone);
                assert!(!state.loading);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_blank_name_enters_profile_step() {
        ReducerTest::new(SessionReducer::new())
            .with_env(env())
            .given_state(SessionState {
                phase: LoginPhase::EnterCode,
                loading: true,
                ..SessionState::default()
            })
            .when_action(SessionAction::Verified {
                session: session(Some("")),
            })
            .then_state(|state| {
                assert_eq!(state.phase, LoginPhase::CompleteProfile);
                assert!(state.is_authenticated());
            })
            .run();
    }

    #[test]
    fn test_profile_failure_still_completes() {
        ReducerTest::new(SessionReducer::new())
            .with_env(env())
            .given_state(SessionState {
                session: Some(session(None)),
                phase: LoginPhase::CompleteProfile,
                loading: true,
                ..SessionState::default()
            })
            .when_action(SessionAction::ProfileSaveFailed {
                error: BookingError::Network("offline".into()),
            })
            .then_state(|state| {
                assert_eq!(state.phase, LoginPhase::Complete);
                assert!(state.session.as_ref().unwrap().display_name.is_none());
            })
            .run();
    }

    #[tokio::test]
    async fn test_failed_verification_leaves_no_session() {
        let api = Arc::new(MockBookingApi::new());
        api.fail_verify(BookingError::Fetch("Invalid OTP".into()));
        let env = env_with(Arc::clone(&api));
        let mut state = SessionState {
            phase: LoginPhase::EnterCode,
            ..SessionState::default()
        };

        let action = SessionAction::VerifyCode {
            phone: "9876543210".into(),
            country_code: "91".into(),
            code: "1234".into(),
        };
        let effects = SessionReducer::new().reduce(&mut state, action, &env);
        for action in resolve_effects(effects).await {
            SessionReducer::new().reduce(&mut state, action, &env);
        }

        assert!(!state.is_authenticated());
        assert_eq!(state.phase, LoginPhase::EnterCode);
        assert_eq!(state.error.unwrap().user_message(), "Invalid OTP");
        assert!(env.storage.auth_token().is_none());
        assert_eq!(api.calls(endpoint::VERIFY_CODE), 1);
    }

    #[tokio::test]
    async fn test_verification_stores_session() {
        let api = Arc::new(MockBookingApi::new());
        api.set_session(session(Some("Asha")));
        let env = env_with(api);
        let mut state = SessionState::default();

        let action = SessionAction::VerifyCode {
            phone: "9876543210".into(),
            country_code: "91".into(),
            code: "1234".into(),
        };
        let effects = SessionReducer::new().reduce(&mut state, action, &env);
        for action in resolve_effects(effects).await {
            SessionReducer::new().reduce(&mut state, action, &env);
        }

        assert_eq!(state.phase, LoginPhase::Complete);
        assert_eq!(env.storage.auth_token().as_deref(), Some("token-1"));
        assert_eq!(env.storage.load_session(), state.session);
    }

    #[tokio::test]
    async fn test_unauthorized_clears_storage_and_redirects() {
        let env = env();
        env.storage.save_session(&session(Some("Asha"))).unwrap();

        let mut state = SessionState {
            session: Some(session(Some("Asha"))),
            phase: LoginPhase::Complete,
            ..SessionState::default()
        };
        let effects = SessionReducer::new().reduce(&mut state, SessionAction::Unauthorized, &env);

        assert!(!state.is_authenticated());
        assert!(state.redirect_to_landing);
        // Reducing alone leaves storage to the effect
        assert!(env.storage.auth_token().is_some());

        assert!(resolve_effects(effects).await.is_empty());
        assert!(env.storage.auth_token().is_none());
        assert!(env.storage.load_session().is_none());
    }

    #[tokio::test]
    async fn test_logout_clears_storage_without_redirect() {
        let env = env();
        env.storage.save_session(&session(Some("Asha"))).unwrap();
        let mut state = SessionState {
            session: Some(session(Some("Asha"))),
            phase: LoginPhase::Complete,
            ..SessionState::default()
        };

        let effects = SessionReducer::new().reduce(&mut state, SessionAction::Logout, &env);
        resolve_effects(effects).await;

        assert!(!state.is_authenticated());
        assert!(!state.redirect_to_landing);
        assert!(env.storage.load_session().is_none());
    }

    #[test]
    fn test_profile_validation() {
        assert!(validate_profile("  ", "14-08-1995").is_err());
        assert!(validate_profile("Asha", "31-02-1995").is_err());
        assert!(validate_profile("Asha", "yesterday").is_err());
        assert_eq!(validate_profile(" Asha ", "").unwrap().dob, None);
        assert_eq!(
            validate_profile("Asha", "1995-08-14").unwrap(),
            ProfileEdit {
                first_name: "Asha".into(),
                dob: NaiveDate::from_ymd_opt(1995, 8, 14),
            }
        );
    }

    #[tokio::test]
    async fn test_edit_profile_updates_session_and_cache() {
        let api = Arc::new(MockBookingApi::new());
        let env = env_with(Arc::clone(&api));
        env.storage.save_session(&session(Some("Asha"))).unwrap();
        let mut state = SessionState {
            session: Some(session(Some("Asha"))),
            phase: LoginPhase::Complete,
            ..SessionState::default()
        };

        let action = SessionAction::EditProfile {
            first_name: "Asha R".into(),
            dob: "14-08-1995".into(),
        };
        let effects = SessionReducer::new().reduce(&mut state, action, &env);
        assert!(state.loading);
        for action in resolve_effects(effects).await {
            SessionReducer::new().reduce(&mut state, action, &env);
        }

        let dob = NaiveDate::from_ymd_opt(1995, 8, 14);
        let updated = state.session.clone().unwrap();
        assert!(!state.loading);
        assert_eq!(updated.display_name.as_deref(), Some("Asha R"));
        assert_eq!(updated.dob, dob);
        assert_eq!(updated.auth_token, "token-1");
        assert_eq!(env.storage.load_session(), Some(updated));
        assert_eq!(
            api.profile_edits(),
            vec![ProfileEdit {
                first_name: "Asha R".into(),
                dob,
            }]
        );
    }

    #[tokio::test]
    async fn test_rejected_profile_edit_keeps_old_values() {
        let api = Arc::new(MockBookingApi::new());
        api.fail_edit_profile(BookingError::Fetch("Name not allowed".into()));
        let env = env_with(api);
        let mut state = SessionState {
            session: Some(session(Some("Asha"))),
            phase: LoginPhase::Complete,
            ..SessionState::default()
        };

        let action = SessionAction::EditProfile {
            first_name: "Bob".into(),
            dob: String::new(),
        };
        let effects = SessionReducer::new().reduce(&mut state, action, &env);
        for action in resolve_effects(effects).await {
            SessionReducer::new().reduce(&mut state, action, &env);
        }

        assert!(!state.loading);
        assert_eq!(state.session.unwrap().display_name.as_deref(), Some("Asha"));
        assert_eq!(state.error.unwrap().user_message(), "Name not allowed");
    }

    #[test]
    fn test_invalid_profile_edit_never_reaches_backend() {
        ReducerTest::new(SessionReducer::new())
            .with_env(env())
            .given_state(SessionState {
                session: Some(session(Some("Asha"))),
                phase: LoginPhase::Complete,
                ..SessionState::default()
            })
            .when_action(SessionAction::EditProfile {
                first_name: "Asha".into(),
                dob: "1995/08/14".into(),
            })
            .then_state(|state| {
                assert!(!state.loading);
                assert!(matches!(state.error, Some(BookingError::Validation(_))));
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_profile_edit_requires_session() {
        ReducerTest::new(SessionReducer::new())
            .with_env(env())
            .given_state(SessionState::default())
            .when_action(SessionAction::EditProfile {
                first_name: "Asha".into(),
                dob: String::new(),
            })
            .then_state(|state| {
                assert!(state.session.is_none());
                assert!(!state.loading);
                assert!(state.error.is_none());
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}
