use std::{collections::HashSet, sync::Arc};

use common::{
    error::{AppError, Res},
    notice::Notice,
};
use store::{client::RecordStore, models::profile::Profile};
use tokio::sync::broadcast::{self, error::TryRecvError};
use url::Url;

use crate::{
    client::IdentityService,
    session::{Identity, SessionEvent, is_recovery_callback},
};

/// The four mutually exclusive interaction modes of the unauthenticated
/// view. `Reset` is only entered through a recovery-tagged callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
    Forgot,
    Reset,
}

impl AuthMode {
    pub fn label(self) -> &'static str {
        match self {
            AuthMode::Login => "login",
            AuthMode::Register => "sign up",
            AuthMode::Forgot => "forgot password",
            AuthMode::Reset => "password reset",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthOp {
    Login,
    Register,
    SendReset,
    UpdatePassword,
}

/// Tracks the current authenticated identity and drives the auth flow.
///
/// The identity is mirrored from the identity service's event stream: set
/// on sign-in, cleared on sign-out. Every operation reports its outcome as
/// a notice and catches its own failures; none is retried automatically.
pub struct SessionController {
    identity_service: Arc<dyn IdentityService>,
    store: Arc<dyn RecordStore>,
    auth_callback_url: String,
    mode: AuthMode,
    authenticated: Option<Identity>,
    busy: HashSet<AuthOp>,
    notice: Option<Notice>,
    events: broadcast::Receiver<SessionEvent>,
}

impl SessionController {
    /// Subscribes to session events, absorbs a recovery callback carried by
    /// the launch context, and restores a cached session if one exists.
    pub async fn start(
        identity_service: Arc<dyn IdentityService>,
        store: Arc<dyn RecordStore>,
        auth_callback_url: String,
        launch: Option<Url>,
    ) -> Self {
        let events = identity_service.subscribe();
        let mut controller = SessionController {
            identity_service,
            store,
            auth_callback_url,
            mode: AuthMode::Login,
            authenticated: None,
            busy: HashSet::new(),
            notice: None,
            events,
        };

        if let Some(url) = launch {
            if is_recovery_callback(&url) {
                controller.open_recovery(&url).await;
            }
        }
        if controller.identity_service.current_session().is_none() {
            if let Err(err) = controller.identity_service.hydrate().await {
                controller.notice = Some(err.to_notice("Couldn't restore session"));
            }
        }
        controller.pump_events();
        controller
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn authenticated(&self) -> Option<&Identity> {
        self.authenticated.as_ref()
    }

    pub fn is_busy(&self, op: AuthOp) -> bool {
        self.busy.contains(&op)
    }

    pub fn take_notice(&mut self) -> Option<Notice> {
        self.notice.take()
    }

    /// Switches between the public modes. Reset is excluded: the recovery
    /// marker is the sole way in.
    pub fn set_mode(&mut self, mode: AuthMode) {
        if mode == AuthMode::Reset && self.mode != AuthMode::Reset {
            self.notice = Some(
                AppError::Precondition(
                    "Password reset starts from the emailed recovery link.".to_string(),
                )
                .to_notice("Couldn't switch mode"),
            );
            return;
        }
        self.mode = mode;
    }

    /// Enters recovery mode from a followed reset link. The marker alone
    /// switches the mode; adopting the link's session may still fail and
    /// leaves `update_password` to report the missing recovery session.
    pub async fn open_recovery(&mut self, url: &Url) {
        if !is_recovery_callback(url) {
            self.notice = Some(
                AppError::Precondition("That link is not a recovery link.".to_string())
                    .to_notice("Couldn't open recovery link"),
            );
            return;
        }
        self.mode = AuthMode::Reset;
        if let Err(err) = self.identity_service.adopt_recovery(url).await {
            self.notice = Some(err.to_notice("Couldn't open recovery link"));
        }
        self.pump_events();
    }

    /// Drains pending session events and mirrors them into local state.
    pub fn pump_events(&mut self) {
        loop {
            match self.events.try_recv() {
                Ok(SessionEvent::SignedIn(identity)) => self.authenticated = Some(identity),
                Ok(SessionEvent::SignedOut) => self.authenticated = None,
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
    }

    pub async fn login(&mut self, email: &str, password: &str) {
        if !self.require_mode(AuthMode::Login, "Login failed") || !self.begin(AuthOp::Login) {
            return;
        }
        match self.identity_service.sign_in(email, password).await {
            Ok(session) => {
                self.notice =
                    Some(Notice::success("Welcome back").with_body("Opening your portal..."));
                self.authenticated = Some(session.identity);
            }
            Err(err) => self.notice = Some(err.to_notice("Login failed")),
        }
        self.finish(AuthOp::Login);
    }

    pub async fn register(&mut self, email: &str, password: &str) {
        if !self.require_mode(AuthMode::Register, "Signup failed") || !self.begin(AuthOp::Register)
        {
            return;
        }
        match self.try_register(email, password).await {
            Ok(Some(identity)) => {
                self.notice =
                    Some(Notice::success("Account created").with_body("Opening your portal..."));
                self.authenticated = Some(identity);
            }
            Ok(None) => {
                self.mode = AuthMode::Login;
                self.notice = Some(
                    Notice::success("Check your inbox")
                        .with_body("Confirm your email to finish signup, then login."),
                );
            }
            Err(err) => self.notice = Some(err.to_notice("Signup failed")),
        }
        self.finish(AuthOp::Register);
    }

    /// Sign-up, plus the default profile row for identities the provider
    /// signs in immediately.
    async fn try_register(&self, email: &str, password: &str) -> Res<Option<Identity>> {
        let session = self
            .identity_service
            .sign_up(email, password, &self.auth_callback_url)
            .await?;
        match session {
            Some(session) => {
                self.store
                    .upsert_profile(&Profile::default_for(session.identity.id))
                    .await?;
                Ok(Some(session.identity))
            }
            None => Ok(None),
        }
    }

    pub async fn send_reset(&mut self, email: &str) {
        if !self.require_mode(AuthMode::Forgot, "Couldn't send reset")
            || !self.begin(AuthOp::SendReset)
        {
            return;
        }
        match self
            .identity_service
            .send_recovery_email(email, &self.auth_callback_url)
            .await
        {
            Ok(()) => {
                self.mode = AuthMode::Login;
                self.notice = Some(
                    Notice::success("Reset link sent")
                        .with_body("Check your email for a reset link."),
                );
            }
            Err(err) => self.notice = Some(err.to_notice("Couldn't send reset")),
        }
        self.finish(AuthOp::SendReset);
    }

    pub async fn update_password(&mut self, new_password: &str) {
        if !self.require_mode(AuthMode::Reset, "Couldn't update password")
            || !self.begin(AuthOp::UpdatePassword)
        {
            return;
        }
        match self.identity_service.update_password(new_password).await {
            Ok(session) => {
                self.notice =
                    Some(Notice::success("Password updated").with_body("You're now signed in."));
                self.authenticated = Some(session.identity);
            }
            Err(err) => self.notice = Some(err.to_notice("Couldn't update password")),
        }
        self.finish(AuthOp::UpdatePassword);
    }

    pub async fn sign_out(&mut self) {
        match self.identity_service.sign_out().await {
            Ok(()) => {
                self.notice =
                    Some(Notice::success("Logged out").with_body("You have been signed out."));
            }
            Err(err) => self.notice = Some(err.to_notice("Couldn't log out")),
        }
        self.pump_events();
    }

    fn require_mode(&mut self, expected: AuthMode, title: &str) -> bool {
        if self.mode == expected {
            return true;
        }
        self.notice = Some(
            AppError::Precondition(format!(
                "Not available in {} mode. Switch to {} first.",
                self.mode.label(),
                expected.label()
            ))
            .to_notice(title),
        );
        false
    }

    fn begin(&mut self, op: AuthOp) -> bool {
        if self.busy.contains(&op) {
            self.notice =
                Some(Notice::error("Hold on").with_body("That request is already in progress."));
            return false;
        }
        self.busy.insert(op);
        true
    }

    fn finish(&mut self, op: AuthOp) {
        self.busy.remove(&op);
        self.pump_events();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Session, SessionEvents, recovery_tokens};
    use async_trait::async_trait;
    use common::notice::NoticeKind;
    use std::sync::Mutex;
    use store::dtos::verification::VerificationDraft;
    use store::models::verification::VerificationRecord;
    use uuid::Uuid;

    fn identity() -> Identity {
        Identity {
            id: Uuid::new_v4(),
            email: "user@example.com".to_string(),
        }
    }

    fn session_for(identity: Identity) -> Session {
        Session {
            access_token: "token".to_string(),
            refresh_token: "refresh".to_string(),
            identity,
        }
    }

    #[derive(Default)]
    struct FakeIdentityService {
        events: SessionEvents,
        session: Mutex<Option<Session>>,
        sign_in_result: Mutex<Option<Res<Session>>>,
        sign_up_session: Mutex<Option<Session>>,
        sign_in_calls: Mutex<usize>,
        password_updates: Mutex<Vec<String>>,
    }

    impl FakeIdentityService {
        fn establish(&self, session: Session) {
            *self.session.lock().unwrap() = Some(session.clone());
            self.events.emit(SessionEvent::SignedIn(session.identity));
        }
    }

    #[async_trait]
    impl IdentityService for FakeIdentityService {
        async fn sign_in(&self, _email: &str, _password: &str) -> Res<Session> {
            *self.sign_in_calls.lock().unwrap() += 1;
            match self.sign_in_result.lock().unwrap().take() {
                Some(Ok(session)) => {
                    self.establish(session.clone());
                    Ok(session)
                }
                Some(Err(err)) => Err(err),
                None => Err(AppError::Provider("Invalid login credentials".to_string())),
            }
        }

        async fn sign_up(
            &self,
            _email: &str,
            _password: &str,
            _redirect_to: &str,
        ) -> Res<Option<Session>> {
            match self.sign_up_session.lock().unwrap().clone() {
                Some(session) => {
                    self.establish(session.clone());
                    Ok(Some(session))
                }
                None => Ok(None),
            }
        }

        async fn sign_out(&self) -> Res<()> {
            *self.session.lock().unwrap() = None;
            self.events.emit(SessionEvent::SignedOut);
            Ok(())
        }

        fn current_session(&self) -> Option<Session> {
            self.session.lock().unwrap().clone()
        }

        async fn send_recovery_email(&self, _email: &str, _callback: &str) -> Res<()> {
            Ok(())
        }

        async fn adopt_recovery(&self, callback: &Url) -> Res<Session> {
            let (access_token, refresh_token) =
                recovery_tokens(callback).ok_or_else(|| {
                    AppError::BadRequest(
                        "Recovery link is missing its session token. Use the email link again."
                            .to_string(),
                    )
                })?;
            let session = Session {
                access_token,
                refresh_token,
                identity: identity(),
            };
            self.establish(session.clone());
            Ok(session)
        }

        async fn update_password(&self, new_password: &str) -> Res<Session> {
            let session = self.current_session().ok_or_else(|| {
                AppError::Precondition(
                    "No recovery session. Use the email link again.".to_string(),
                )
            })?;
            self.password_updates
                .lock()
                .unwrap()
                .push(new_password.to_string());
            Ok(session)
        }

        async fn hydrate(&self) -> Res<Option<Identity>> {
            Ok(self.current_session().map(|session| session.identity))
        }

        fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
            self.events.subscribe()
        }
    }

    #[derive(Default)]
    struct FakeStore {
        upserts: Mutex<Vec<Profile>>,
    }

    #[async_trait]
    impl RecordStore for FakeStore {
        async fn fetch_profile(&self, _user_id: Uuid) -> Res<Option<Profile>> {
            Ok(None)
        }

        async fn upsert_profile(&self, profile: &Profile) -> Res<()> {
            self.upserts.lock().unwrap().push(profile.clone());
            Ok(())
        }

        async fn list_records(&self, _user_id: Uuid) -> Res<Vec<VerificationRecord>> {
            Ok(Vec::new())
        }

        async fn insert_record(&self, _user_id: Uuid, _draft: &VerificationDraft) -> Res<()> {
            Ok(())
        }

        async fn delete_record(&self, _user_id: Uuid, _record_id: Uuid) -> Res<()> {
            Ok(())
        }
    }

    async fn controller_with(
        service: Arc<FakeIdentityService>,
        store: Arc<FakeStore>,
        launch: Option<Url>,
    ) -> SessionController {
        SessionController::start(
            service,
            store,
            "http://localhost:3000/portal".to_string(),
            launch,
        )
        .await
    }

    #[tokio::test]
    async fn initial_mode_is_login_without_a_recovery_marker() {
        let controller = controller_with(
            Arc::new(FakeIdentityService::default()),
            Arc::new(FakeStore::default()),
            None,
        )
        .await;
        assert_eq!(controller.mode(), AuthMode::Login);
        assert!(controller.authenticated().is_none());
    }

    #[tokio::test]
    async fn recovery_tagged_launch_enters_reset_mode_with_a_session() {
        let url = Url::parse(
            "http://localhost:3000/portal?type=recovery#access_token=abc&refresh_token=def",
        )
        .unwrap();
        let service = Arc::new(FakeIdentityService::default());
        let mut controller =
            controller_with(service.clone(), Arc::new(FakeStore::default()), Some(url)).await;

        assert_eq!(controller.mode(), AuthMode::Reset);
        assert!(service.current_session().is_some());
        assert!(controller.take_notice().is_none());
    }

    #[tokio::test]
    async fn untagged_launch_url_is_ignored() {
        let url = Url::parse("http://localhost:3000/portal?type=signup").unwrap();
        let controller = controller_with(
            Arc::new(FakeIdentityService::default()),
            Arc::new(FakeStore::default()),
            Some(url),
        )
        .await;
        assert_eq!(controller.mode(), AuthMode::Login);
    }

    #[tokio::test]
    async fn failed_login_surfaces_the_provider_message_and_stays_in_login() {
        let service = Arc::new(FakeIdentityService::default());
        let mut controller =
            controller_with(service.clone(), Arc::new(FakeStore::default()), None).await;

        controller.login("user@example.com", "wrong").await;

        let notice = controller.take_notice().unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert_eq!(notice.title, "Login failed");
        assert!(notice.body.unwrap().contains("Invalid login credentials"));
        assert_eq!(controller.mode(), AuthMode::Login);
        assert!(controller.authenticated().is_none());
    }

    #[tokio::test]
    async fn successful_login_surfaces_the_identity() {
        let who = identity();
        let service = Arc::new(FakeIdentityService::default());
        *service.sign_in_result.lock().unwrap() = Some(Ok(session_for(who.clone())));
        let mut controller =
            controller_with(service.clone(), Arc::new(FakeStore::default()), None).await;

        controller.login("user@example.com", "secret").await;

        assert_eq!(controller.authenticated(), Some(&who));
        assert_eq!(controller.take_notice().unwrap().kind, NoticeKind::Success);
    }

    #[tokio::test]
    async fn register_without_session_returns_to_login_and_skips_profile_bootstrap() {
        let service = Arc::new(FakeIdentityService::default());
        let store = Arc::new(FakeStore::default());
        let mut controller = controller_with(service, store.clone(), None).await;

        controller.set_mode(AuthMode::Register);
        controller.register("new@example.com", "secret").await;

        assert_eq!(controller.mode(), AuthMode::Login);
        assert!(controller.authenticated().is_none());
        assert!(store.upserts.lock().unwrap().is_empty());
        let notice = controller.take_notice().unwrap();
        assert_eq!(notice.title, "Check your inbox");
    }

    #[tokio::test]
    async fn register_with_immediate_session_creates_the_default_profile() {
        let who = identity();
        let service = Arc::new(FakeIdentityService::default());
        *service.sign_up_session.lock().unwrap() = Some(session_for(who.clone()));
        let store = Arc::new(FakeStore::default());
        let mut controller = controller_with(service, store.clone(), None).await;

        controller.set_mode(AuthMode::Register);
        controller.register("new@example.com", "secret").await;

        assert_eq!(controller.authenticated(), Some(&who));
        let upserts = store.upserts.lock().unwrap();
        assert_eq!(upserts.len(), 1);
        assert_eq!(upserts[0], Profile::default_for(who.id));
    }

    #[tokio::test]
    async fn send_reset_returns_to_login_without_authenticating() {
        let mut controller = controller_with(
            Arc::new(FakeIdentityService::default()),
            Arc::new(FakeStore::default()),
            None,
        )
        .await;

        controller.set_mode(AuthMode::Forgot);
        controller.send_reset("user@example.com").await;

        assert_eq!(controller.mode(), AuthMode::Login);
        assert!(controller.authenticated().is_none());
        assert_eq!(controller.take_notice().unwrap().title, "Reset link sent");
    }

    #[tokio::test]
    async fn update_password_outside_reset_mode_is_a_precondition_failure() {
        let service = Arc::new(FakeIdentityService::default());
        let mut controller =
            controller_with(service.clone(), Arc::new(FakeStore::default()), None).await;

        controller.update_password("hunter2").await;

        let notice = controller.take_notice().unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(service.password_updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_password_without_recovery_session_reports_the_specific_error() {
        // Marker present but the link carries no token: mode flips to Reset
        // while no recovery session exists.
        let url = Url::parse("http://localhost:3000/portal?type=recovery").unwrap();
        let service = Arc::new(FakeIdentityService::default());
        let mut controller =
            controller_with(service.clone(), Arc::new(FakeStore::default()), Some(url)).await;
        assert_eq!(controller.mode(), AuthMode::Reset);
        controller.take_notice();

        controller.update_password("hunter2").await;

        let notice = controller.take_notice().unwrap();
        assert!(
            notice
                .body
                .unwrap()
                .contains("No recovery session. Use the email link again.")
        );
        assert!(service.password_updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn in_flight_operation_rejects_duplicate_submission() {
        let service = Arc::new(FakeIdentityService::default());
        let mut controller =
            controller_with(service.clone(), Arc::new(FakeStore::default()), None).await;

        controller.busy.insert(AuthOp::Login);
        controller.login("user@example.com", "secret").await;

        assert_eq!(*service.sign_in_calls.lock().unwrap(), 0);
        assert_eq!(controller.take_notice().unwrap().kind, NoticeKind::Error);
    }

    #[tokio::test]
    async fn sign_out_clears_the_mirrored_identity() {
        let who = identity();
        let service = Arc::new(FakeIdentityService::default());
        *service.sign_in_result.lock().unwrap() = Some(Ok(session_for(who)));
        let mut controller =
            controller_with(service.clone(), Arc::new(FakeStore::default()), None).await;

        controller.login("user@example.com", "secret").await;
        assert!(controller.authenticated().is_some());

        controller.sign_out().await;
        assert!(controller.authenticated().is_none());
        assert_eq!(controller.take_notice().unwrap().title, "Logged out");
    }

    #[tokio::test]
    async fn reset_mode_cannot_be_entered_by_switching() {
        let mut controller = controller_with(
            Arc::new(FakeIdentityService::default()),
            Arc::new(FakeStore::default()),
            None,
        )
        .await;

        controller.set_mode(AuthMode::Reset);

        assert_eq!(controller.mode(), AuthMode::Login);
        assert_eq!(controller.take_notice().unwrap().kind, NoticeKind::Error);
    }
}
