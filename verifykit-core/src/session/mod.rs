//! Challenge session orchestration.
//!
//! One orchestrator drives one session: it resolves the challenge list,
//! walks it strictly in order through create → execute → validate, applies
//! the local attempt policy, keeps the biometric PIN cache honest, and
//! completes the device association when everything validated. The host
//! observes progress through a single-slot latest-state channel: a receiver
//! that (re)attaches after a suspension point sees the current step, not
//! history.
//!
//! The orchestrator is never internally parallel. Methods take `&mut self`,
//! so two challenges are never in flight at once and no two validate calls
//! for the same challenge can overlap.


use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::watch;

use crate::attempts::{AttemptCounter, AttemptDecision};
use crate::client::{AssociationClient, LivenessClient, PinClient};
use crate::error::VerifyKitError;
use crate::pin_cache::PinCacheGuard;
use crate::storage::AssociationStore;
use crate::types::{Challenge, ChallengeType, Document, ValidationSession};

/// What a session is run for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionTarget {
    /// Associate this device with a document identity.
    Association {
        /// The document to associate with.
        document: Document,
    },
    /// Re-verify an already-associated device with a single challenge kind.
    Standalone {
        /// The challenge kind to run.
        challenge_type: ChallengeType,
    },
}

/// Lifecycle state published to the host.
///
/// Delivered through a latest-value channel: emitting a new state supersedes
/// interest in the previous one.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// Session constructed, nothing started yet.
    Initial,
    /// A network call is in flight.
    Loading,
    /// The host must present the given challenge and collect its evidence.
    LaunchChallenge {
        /// The challenge to present.
        challenge: Challenge,
        /// Whether this presentation follows a failed validation.
        is_retry: bool,
        /// For PIN challenges: the server reported a PIN change more recent
        /// than the cache's last confirmed use, so manual entry is forced.
        pin_recently_changed: bool,
    },
    /// Every challenge validated; the session is complete.
    Success {
        /// Identity token returned on association completion, if any.
        id_token: Option<String>,
    },
    /// The session terminated with an error. Emitted exactly once.
    Error {
        /// The terminal error.
        error: VerifyKitError,
    },
}

/// Result of executing the current challenge, for the host UI to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChallengeExecution {
    /// Liveness: hand this session id to the external face detector.
    Liveness {
        /// Server-issued detector session id.
        session_id: String,
    },
    /// PIN: render the PIN pad, forcing manual entry when flagged.
    Pin {
        /// Whether the cached biometric PIN must not be offered this time.
        pin_recently_changed: bool,
    },
}

/// Challenge-specific evidence collected by the host UI.
pub enum ChallengeEvidence {
    /// The external detector finished its capture; liveness validation is
    /// evidence-free and relies on server-side session state.
    Liveness,
    /// Entered PIN digits plus biometric cache instructions.
    Pin {
        /// The digits the user entered (or the cache supplied).
        pin: SecretString,
        /// Whether the digits came from biometric-assisted unlock.
        used_biometric: bool,
        /// Whether the user opted into caching this PIN behind biometrics.
        save_pin_to_biometrics: bool,
    },
}

/// Failure reported by the host's liveness capture UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureFailure {
    /// Camera permission was denied.
    PermissionDenied,
    /// The user abandoned the capture flow.
    Cancelled,
    /// The capture component failed for another reason.
    Failed {
        /// Capture component failure description.
        detail: String,
    },
}

/// Drives a list of challenges to completion, in order.
pub struct SessionOrchestrator {
    liveness: Arc<LivenessClient>,
    pin: Arc<PinClient>,
    association: Arc<AssociationClient>,
    associations: Arc<dyn AssociationStore>,
    pin_cache: PinCacheGuard,
    target: SessionTarget,
    state_tx: watch::Sender<SessionState>,
    session: Option<ValidationSession>,
    challenges: Vec<Challenge>,
    index: usize,
    attempts: AttemptCounter,
    pin_recently_changed: bool,
    finished: bool,
}

impl SessionOrchestrator {
    pub(crate) fn new(
        liveness: Arc<LivenessClient>,
        pin: Arc<PinClient>,
        association: Arc<AssociationClient>,
        associations: Arc<dyn AssociationStore>,
        pin_cache: PinCacheGuard,
        target: SessionTarget,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Initial);
        Self {
            liveness,
            pin,
            association,
            associations,
            pin_cache,
            target,
            state_tx,
            session: None,
            challenges: Vec::new(),
            index: 0,
            attempts: AttemptCounter::new(),
            pin_recently_changed: false,
            finished: false,
        }
    }

    /// Subscribes to lifecycle states. The receiver immediately observes the
    /// current state and each new state as it replaces the previous one.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Snapshot of the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state_tx.borrow().clone()
    }

    /// The resolved validation session, once [`Self::start`] succeeded.
    #[must_use]
    pub fn session(&self) -> Option<&ValidationSession> {
        self.session.as_ref()
    }

    /// Resolves the challenge list and launches the first challenge.
    ///
    /// # Errors
    ///
    /// List-resolution failures are terminal: the session moves to
    /// [`SessionState::Error`] and the error is returned.
    pub async fn start(&mut self) -> Result<(), VerifyKitError> {
        self.ensure_active()?;
        self.emit(SessionState::Loading);

        let resolved = self.resolve_session().await;
        let session = match resolved {
            Ok(session) => session,
            Err(error) => return Err(self.fail(error)),
        };

        log::info!(
            "session {} resolved with {} challenge(s)",
            session.id,
            session.challenges.len()
        );
        self.challenges = session.challenges.clone();
        self.session = Some(session);
        self.index = 0;
        self.attempts.reset();
        self.pin_recently_changed = false;
        self.launch_current().await
    }

    /// Executes the current challenge, returning what the host UI needs to
    /// collect evidence.
    ///
    /// For PIN challenges the server's `pinLastUpdated` instant is compared
    /// against the cache's last confirmed biometric use; the resulting flag
    /// is returned and repeated on subsequent launch states.
    ///
    /// # Errors
    ///
    /// Reachability and server-fatal errors are terminal; other failures
    /// consume a validation attempt and re-launch the challenge.
    pub async fn execute_current(&mut self) -> Result<ChallengeExecution, VerifyKitError> {
        self.ensure_active()?;
        let (challenge, challenge_type) = self.current()?;
        self.emit(SessionState::Loading);

        match challenge_type {
            ChallengeType::Liveness => {
                let executed = self.liveness.execute_challenge(&challenge.id).await;
                match executed {
                    Ok(session_id) => Ok(ChallengeExecution::Liveness { session_id }),
                    Err(error) => Err(self.handle_challenge_error(error).await),
                }
            }
            ChallengeType::Pin => {
                let executed = self.pin.execute_challenge(&challenge.id).await;
                match executed {
                    Ok(pin_last_updated) => {
                        let recently_changed =
                            self.pin_cache.pin_recently_changed(pin_last_updated).await;
                        match recently_changed {
                            Ok(recently_changed) => {
                                self.pin_recently_changed = recently_changed;
                                Ok(ChallengeExecution::Pin {
                                    pin_recently_changed: recently_changed,
                                })
                            }
                            Err(error) => Err(self.handle_challenge_error(error).await),
                        }
                    }
                    Err(error) => Err(self.handle_challenge_error(error).await),
                }
            }
        }
    }

    /// Validates the current challenge with the evidence the host collected.
    ///
    /// A negative validation (wrong PIN) consumes an attempt and re-launches
    /// the challenge flagged as a retry; the third consecutive failure
    /// terminates the session with
    /// [`VerifyKitError::ChallengeValidationExhausted`]. A successful
    /// validation advances to the next challenge, or completes the session
    /// when the list is exhausted.
    ///
    /// # Errors
    ///
    /// Reachability and server-fatal errors are terminal; other failures
    /// consume a validation attempt like a negative validation.
    pub async fn validate_current(
        &mut self,
        evidence: ChallengeEvidence,
    ) -> Result<(), VerifyKitError> {
        self.ensure_active()?;
        let (challenge, challenge_type) = self.current()?;

        let outcome = match (challenge_type, &evidence) {
            (ChallengeType::Liveness, ChallengeEvidence::Liveness) => {
                self.emit(SessionState::Loading);
                self.liveness.validate_challenge(&challenge.id).await
            }
            (ChallengeType::Pin, ChallengeEvidence::Pin { pin, .. }) => {
                self.emit(SessionState::Loading);
                self.pin.validate_challenge(&challenge.id, pin).await
            }
            _ => {
                return Err(VerifyKitError::Unknown {
                    detail: "evidence does not match the current challenge".to_string(),
                })
            }
        };

        match outcome {
            Ok(true) => {
                self.settle_pin_cache(&evidence).await;
                self.attempts.record_success();
                self.index += 1;
                self.pin_recently_changed = false;
                self.launch_current().await
            }
            Ok(false) => match self.attempts.record_failure() {
                AttemptDecision::GiveUp => {
                    Err(self.fail(VerifyKitError::ChallengeValidationExhausted))
                }
                _ => self.launch_current().await,
            },
            Err(error) => Err(self.handle_challenge_error(error).await),
        }
    }

    /// Accepts a capture failure reported by the host's liveness UI and
    /// terminates the session with the matching taxonomy error.
    pub fn report_capture_failure(&mut self, failure: CaptureFailure) -> VerifyKitError {
        let error = match failure {
            CaptureFailure::PermissionDenied => VerifyKitError::CameraPermissionDenied,
            CaptureFailure::Cancelled => VerifyKitError::UserCancelled,
            CaptureFailure::Failed { detail } => VerifyKitError::Unknown { detail },
        };
        self.fail(error)
    }

    async fn resolve_session(&self) -> Result<ValidationSession, VerifyKitError> {
        match &self.target {
            SessionTarget::Association { document } => {
                document.validate()?;
                if !self.association.check_can_associate(document).await? {
                    return Err(VerifyKitError::UserCannotBeAssociated);
                }
                self.association.create_device_association(document).await
            }
            SessionTarget::Standalone { challenge_type } => {
                if self.associations.read().await?.is_none() {
                    return Err(VerifyKitError::DeviceNotAssociated);
                }
                self.association
                    .create_validation_session(*challenge_type)
                    .await
            }
        }
    }

    /// Emits the launch state for the current challenge, or completes the
    /// session when the list is exhausted.
    async fn launch_current(&mut self) -> Result<(), VerifyKitError> {
        if self.index >= self.challenges.len() {
            return self.finish_success().await;
        }

        let challenge = self.challenges[self.index].clone();
        if ChallengeType::from_tag(&challenge.challenge_type).is_none() {
            let tag = challenge.challenge_type;
            return Err(self.fail(VerifyKitError::UnknownChallengeType { tag }));
        }

        self.emit(SessionState::LaunchChallenge {
            challenge,
            is_retry: self.attempts.is_retry(),
            pin_recently_changed: self.pin_recently_changed,
        });
        Ok(())
    }

    async fn finish_success(&mut self) -> Result<(), VerifyKitError> {
        match &self.target {
            SessionTarget::Association { .. } => {
                let session_id = self
                    .session
                    .as_ref()
                    .map(|session| session.id.clone())
                    .ok_or_else(|| VerifyKitError::Unknown {
                        detail: "association session was never resolved".to_string(),
                    })?;

                self.emit(SessionState::Loading);
                let completed = self
                    .association
                    .complete_device_association(&session_id)
                    .await;
                let association = match completed {
                    Ok(association) => association,
                    Err(error) => return Err(self.fail(error)),
                };
                let saved = self.associations.save(&association).await;
                if let Err(error) = saved {
                    return Err(self.fail(error.into()));
                }

                log::info!("device association completed");
                self.finished = true;
                self.emit(SessionState::Success {
                    id_token: association.id_token,
                });
                Ok(())
            }
            SessionTarget::Standalone { .. } => {
                self.finished = true;
                self.emit(SessionState::Success { id_token: None });
                Ok(())
            }
        }
    }

    /// Routes an execute/validate failure: fatal errors terminate the
    /// session, everything else consumes a validation attempt.
    async fn handle_challenge_error(&mut self, error: VerifyKitError) -> VerifyKitError {
        if Self::is_fatal(&error) {
            return self.fail(error);
        }

        match self.attempts.record_failure() {
            AttemptDecision::GiveUp => self.fail(VerifyKitError::ChallengeValidationExhausted),
            _ => {
                log::debug!("challenge attempt failed, retrying: {error}");
                if let Err(launch_error) = self.launch_current().await {
                    return launch_error;
                }
                error
            }
        }
    }

    /// Errors the attempt policy never absorbs.
    const fn is_fatal(error: &VerifyKitError) -> bool {
        error.is_reachability()
            || matches!(
                error,
                VerifyKitError::TooManyAttempts
                    | VerifyKitError::UnknownChallengeType { .. }
                    | VerifyKitError::DeviceNotAssociated
                    | VerifyKitError::UserCannotBeAssociated
            )
    }

    /// Applies the biometric cache instructions of successfully validated
    /// PIN evidence. Best-effort: cache failures never undo a successful
    /// validation.
    async fn settle_pin_cache(&self, evidence: &ChallengeEvidence) {
        let ChallengeEvidence::Pin {
            pin,
            used_biometric,
            save_pin_to_biometrics,
        } = evidence
        else {
            return;
        };

        if *save_pin_to_biometrics {
            if let Err(error) = self.pin_cache.persist_cached_pin(pin).await {
                log::warn!("failed to cache pin after validation: {error}");
            }
        }
        if *used_biometric || *save_pin_to_biometrics {
            if let Err(error) = self.pin_cache.record_biometric_usage().await {
                log::warn!("failed to record biometric usage: {error}");
            }
        }
    }

    fn current(&self) -> Result<(Challenge, ChallengeType), VerifyKitError> {
        let challenge = self
            .challenges
            .get(self.index)
            .cloned()
            .ok_or_else(|| VerifyKitError::Unknown {
                detail: "no challenge is currently in progress".to_string(),
            })?;
        let challenge_type = ChallengeType::from_tag(&challenge.challenge_type).ok_or_else(
            || VerifyKitError::UnknownChallengeType {
                tag: challenge.challenge_type.clone(),
            },
        )?;
        Ok((challenge, challenge_type))
    }

    fn ensure_active(&self) -> Result<(), VerifyKitError> {
        if self.finished {
            return Err(VerifyKitError::Unknown {
                detail: "session already finished".to_string(),
            });
        }
        Ok(())
    }

    fn emit(&self, state: SessionState) {
        self.state_tx.send_replace(state);
    }

    /// Terminal failure. The error state is emitted exactly once; later
    /// failures on an already-finished session return without re-emitting.
    fn fail(&mut self, error: VerifyKitError) -> VerifyKitError {
        if !self.finished {
            self.finished = true;
            log::error!("session failed: {error}");
            self.emit(SessionState::Error {
                error: error.clone(),
            });
        }
        error
    }
}
