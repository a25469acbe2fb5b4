//! Tenant provisioning: directory record, namespace, ledger account,
//! reference data, owner, then a welcome notification.

use std::sync::{Arc, LazyLock};

use rand::Rng;
use rand::distributions::Alphanumeric;
use regex::Regex;
use tenantry_channels::MessageDispatcher;
use tenantry_core::error::{ProvisioningStage, Result, TenantryError};
use tenantry_core::{Message, MessageChannel, MessengerType, RequestContext};

use crate::db::{PlatformDb, Tenant, TenantConfigUpdate, TenantStatus};
use crate::ledger::DistributionAccountProvisioner;
use crate::namespace::{MAX_SCHEMA_NAME_LEN, NamespaceStore, NewOwner, SCHEMA_PREFIX, TenantUser};
use crate::network::{MIN_TENANT_DISTRIBUTION_ACCOUNT_AMOUNT, Network};

static TENANT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z-]*$").expect("valid tenant name regex"));

const OWNER_PASSWORD_LEN: usize = 24;

/// bcrypt accepts work factors in this range.
const PASSWORD_HASH_COSTS: std::ops::RangeInclusive<u32> = 4..=31;

/// Longest tenant name whose namespace still fits in `MAX_SCHEMA_NAME_LEN`.
pub const MAX_TENANT_NAME_LEN: usize = MAX_SCHEMA_NAME_LEN - SCHEMA_PREFIX.len();

/// Reject names that are not lowercase letters and dashes, or are too long.
pub fn validate_tenant_name(name: &str) -> Result<()> {
    if !TENANT_NAME_RE.is_match(name) {
        return Err(TenantryError::validation(format!(
            "invalid tenant name {name:?}. It should only contains lower case letters and dash (-)"
        )));
    }
    if name.len() > MAX_TENANT_NAME_LEN {
        return Err(TenantryError::validation(format!(
            "invalid tenant name {name:?}. It should be at most {MAX_TENANT_NAME_LEN} characters long"
        )));
    }
    Ok(())
}

fn validate_owner(owner: &NewOwner) -> Result<()> {
    if owner.first_name.trim().is_empty() || owner.last_name.trim().is_empty() {
        return Err(TenantryError::validation("owner first and last name are required"));
    }
    let email = owner.email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(TenantryError::validation(format!("invalid owner email {email:?}"))),
    }
}

/// Input for a new tenant.
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    pub owner_first_name: String,
    pub owner_last_name: String,
    pub owner_email: String,
    pub organization_name: String,
}

impl NewTenant {
    pub fn owner(&self) -> NewOwner {
        NewOwner {
            first_name: self.owner_first_name.clone(),
            last_name: self.owner_last_name.clone(),
            email: self.owner_email.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_tenant_name(&self.name)?;
        validate_owner(&self.owner())?;
        if self.organization_name.trim().is_empty() {
            return Err(TenantryError::validation("organization name is required"));
        }
        Ok(())
    }
}

/// Settings applied to every tenant this manager provisions.
#[derive(Debug, Clone)]
pub struct ProvisioningOptions {
    pub network: Network,
    /// Native units the distribution account is bootstrapped with.
    pub bootstrap_amount: i64,
    pub ui_base_url: String,
    /// Channels tried, in order, for the welcome message.
    pub channel_priority: Vec<MessageChannel>,
    pub email_sender_type: MessengerType,
    pub sms_sender_type: Option<MessengerType>,
    /// bcrypt cost for the owner's initial password.
    pub password_hash_cost: u32,
}

impl Default for ProvisioningOptions {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            bootstrap_amount: MIN_TENANT_DISTRIBUTION_ACCOUNT_AMOUNT,
            ui_base_url: "http://localhost:3000".into(),
            channel_priority: vec![MessageChannel::Email],
            email_sender_type: MessengerType::DryRun,
            sms_sender_type: None,
            password_hash_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl ProvisioningOptions {
    pub fn validate(&self) -> Result<()> {
        if self.bootstrap_amount < MIN_TENANT_DISTRIBUTION_ACCOUNT_AMOUNT {
            return Err(TenantryError::validation(format!(
                "the tenant distribution account bootstrap amount must be at least {MIN_TENANT_DISTRIBUTION_ACCOUNT_AMOUNT}, got {}",
                self.bootstrap_amount
            )));
        }
        if !self.email_sender_type.serves(MessageChannel::Email) {
            return Err(TenantryError::validation(format!(
                "{} cannot send email", self.email_sender_type
            )));
        }
        match self.sms_sender_type {
            Some(sms) if !sms.serves(MessageChannel::Sms) => {
                return Err(TenantryError::validation(format!("{sms} cannot send sms")));
            }
            _ => {}
        }
        if !PASSWORD_HASH_COSTS.contains(&self.password_hash_cost) {
            return Err(TenantryError::validation(format!(
                "the password hash cost must be between {} and {}, got {}",
                PASSWORD_HASH_COSTS.start(), PASSWORD_HASH_COSTS.end(), self.password_hash_cost
            )));
        }
        Ok(())
    }
}

/// Runs the provisioning workflow for new tenants.
///
/// Steps run strictly in order and the request context is checked for
/// cancellation between them. Nothing is rolled back on failure: a tenant
/// left in `provisioning` status is finished with [`resume_tenant`].
///
/// [`resume_tenant`]: ProvisioningManager::resume_tenant
pub struct ProvisioningManager {
    db: Arc<PlatformDb>,
    namespaces: NamespaceStore,
    ledger: Arc<dyn DistributionAccountProvisioner>,
    dispatcher: MessageDispatcher,
    options: ProvisioningOptions,
}

impl ProvisioningManager {
    pub fn new(
        db: Arc<PlatformDb>,
        namespaces: NamespaceStore,
        ledger: Arc<dyn DistributionAccountProvisioner>,
        dispatcher: MessageDispatcher,
        options: ProvisioningOptions,
    ) -> Self {
        Self { db, namespaces, ledger, dispatcher, options }
    }

    pub fn db(&self) -> &Arc<PlatformDb> {
        &self.db
    }

    pub fn namespaces(&self) -> &NamespaceStore {
        &self.namespaces
    }

    pub fn options(&self) -> &ProvisioningOptions {
        &self.options
    }

    /// Provision a brand-new tenant. An existing name fails with
    /// [`TenantryError::DuplicateTenant`] and nothing is changed.
    pub async fn provision_tenant(&self, ctx: &RequestContext, new: &NewTenant) -> Result<Tenant> {
        new.validate()?;
        self.options.validate()?;

        ctx.ensure_active()?;
        let tenant = self.db.add_tenant(&new.name, &new.organization_name)
            .map_err(|e| TenantryError::stage(ProvisioningStage::CreateTenant, e))?;
        tracing::info!(tenant = %tenant.name, id = %tenant.id, "tenant record created");

        self.complete(ctx, tenant, &new.owner()).await
    }

    /// Finish a tenant a previous run left in `provisioning` status.
    pub async fn resume_tenant(&self, ctx: &RequestContext, name: &str, owner: &NewOwner) -> Result<Tenant> {
        validate_tenant_name(name)?;
        validate_owner(owner)?;
        self.options.validate()?;

        let tenant = self.db.get_tenant_by_name(name)?
            .ok_or_else(|| TenantryError::validation(format!("tenant {name} does not exist")))?;
        if tenant.status != TenantStatus::Provisioning {
            return Err(TenantryError::validation(format!(
                "tenant {name} is {}, only tenants still provisioning can be resumed", tenant.status
            )));
        }

        tracing::info!(tenant = %tenant.name, id = %tenant.id, "resuming tenant provisioning");
        self.db.log_event("tenant_provisioning_resumed", "system", &tenant.id, None)?;
        self.complete(ctx, tenant, owner).await
    }

    /// Steps 3 onwards. Each one checks what is already done, so running
    /// them again after a partial failure is safe.
    async fn complete(&self, ctx: &RequestContext, mut tenant: Tenant, owner: &NewOwner) -> Result<Tenant> {
        ctx.ensure_active()?;
        self.create_namespace(&tenant)
            .map_err(|e| TenantryError::stage(ProvisioningStage::CreateNamespace, e))?;

        ctx.ensure_active()?;
        if tenant.distribution_account.is_none() {
            let stage = |e| TenantryError::stage(ProvisioningStage::ProvisionDistributionAccount, e);
            let account = self.ledger
                .provision(ctx, &tenant, self.options.network, self.options.bootstrap_amount)
                .await
                .map_err(stage)?;
            tenant = self.db.set_distribution_account(&tenant.id, &account).map_err(stage)?;
            tracing::info!(tenant = %tenant.name, account = %account.address, "distribution account provisioned");
        } else {
            tracing::debug!(tenant = %tenant.name, "distribution account already provisioned");
        }

        ctx.ensure_active()?;
        self.seed_reference_data(&tenant)
            .map_err(|e| TenantryError::stage(ProvisioningStage::SeedReferenceData, e))?;

        ctx.ensure_active()?;
        let user = self.create_owner(&tenant, owner)
            .map_err(|e| TenantryError::stage(ProvisioningStage::CreateOwner, e))?;

        ctx.ensure_active()?;
        let tenant = self.activate(&tenant)
            .map_err(|e| TenantryError::stage(ProvisioningStage::ActivateTenant, e))?;

        // The tenant is usable from here on; a failed welcome message only gets logged.
        if let Err(e) = self.send_welcome(ctx, &tenant, &user).await {
            tracing::error!(tenant = %tenant.name, error = %e, "sending the welcome message to the owner");
        }

        tracing::info!("tenant {} added successfully", tenant.name);
        tracing::info!("tenant ID: {}", tenant.id);
        Ok(tenant)
    }

    fn create_namespace(&self, tenant: &Tenant) -> Result<()> {
        let ns = self.namespaces.ensure_namespace(&tenant.schema_name)?;
        ns.set_organization_name(&tenant.organization_name)?;
        self.db.log_event("tenant_namespace_ready", "system", &tenant.id, Some(&tenant.schema_name))
    }

    fn seed_reference_data(&self, tenant: &Tenant) -> Result<()> {
        let network = tenant.network.unwrap_or(self.options.network);
        let ns = self.namespaces.open(&tenant.schema_name)?;
        let assets = ns.seed_assets(network.default_assets())?;
        let wallets = ns.seed_wallets(network.default_wallets())?;
        tracing::info!(tenant = %tenant.name, %network, assets, wallets, "reference data seeded");
        Ok(())
    }

    fn create_owner(&self, tenant: &Tenant, owner: &NewOwner) -> Result<TenantUser> {
        let ns = self.namespaces.open(&tenant.schema_name)?;
        if let Some(existing) = ns.get_owner()? {
            if existing.email != owner.email {
                return Err(TenantryError::validation(format!(
                    "tenant {} already has owner {}, not {}", tenant.name, existing.email, owner.email
                )));
            }
            tracing::info!(tenant = %tenant.name, email = %owner.email, "owner already exists");
            return Ok(existing);
        }

        let hash = hash_password(&random_password(), self.options.password_hash_cost)?;
        let user = ns.create_owner(owner, &hash)?;
        self.db.log_event("tenant_owner_created", "system", &tenant.id, Some(&user.id))?;
        Ok(user)
    }

    fn activate(&self, tenant: &Tenant) -> Result<Tenant> {
        self.db.update_tenant_config(&tenant.id, &TenantConfigUpdate {
            ui_base_url: Some(self.options.ui_base_url.clone()),
            email_sender_type: Some(self.options.email_sender_type),
            sms_sender_type: self.options.sms_sender_type,
        })?;
        self.db.update_tenant_status(&tenant.id, TenantStatus::Active)
    }

    async fn send_welcome(&self, ctx: &RequestContext, tenant: &Tenant, owner: &TenantUser) -> Result<()> {
        let message = welcome_message(tenant, owner, &self.options.ui_base_url);
        let channel = self.dispatcher
            .send_message(ctx, &message, &self.options.channel_priority)
            .await?;

        let recipient = message.recipient_for(channel).unwrap_or_default();
        self.namespaces
            .open(&tenant.schema_name)?
            .record_message(channel, recipient, &message.title)
    }
}

fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).map_err(|e| TenantryError::PasswordHash(e.to_string()))
}

fn random_password() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(OWNER_PASSWORD_LEN)
        .map(char::from)
        .collect()
}

fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#x27;")
}

fn welcome_message(tenant: &Tenant, owner: &TenantUser, ui_base_url: &str) -> Message {
    let login_url = html_escape(&format!("{}/forgot-password", ui_base_url.trim_end_matches('/')));
    Message::email(
        &owner.email,
        format!("Welcome to {}", tenant.organization_name),
        format!(
            "<p>Hello {},</p>\
             <p>You have been added as the owner of {} (tenant <b>{}</b>).</p>\
             <p>Set your password to get started: <a href=\"{login_url}\">{login_url}</a></p>",
            html_escape(&owner.first_name),
            html_escape(&tenant.organization_name),
            html_escape(&tenant.name),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::DistributionAccount;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tenantry_channels::ChannelRegistry;
    use tenantry_channels::dry_run::DryRunClient;
    use tokio_util::sync::CancellationToken;

    const ACCOUNT: &str = "GDAZUHI4ARV73G3FI4JEZP57MPQTJ5I6BW7VZLNVHQJPANKPUGY2SDUY";

    /// Fails the first `failures` calls, then hands out a fixed account.
    struct FlakyLedger {
        failures: usize,
        calls: AtomicUsize,
        cancel_on_call: Option<CancellationToken>,
    }

    impl FlakyLedger {
        fn new(failures: usize) -> Arc<Self> {
            Arc::new(Self { failures, calls: AtomicUsize::new(0), cancel_on_call: None })
        }

        fn cancelling(token: CancellationToken) -> Arc<Self> {
            Arc::new(Self { failures: 0, calls: AtomicUsize::new(0), cancel_on_call: Some(token) })
        }
    }

    #[async_trait]
    impl DistributionAccountProvisioner for FlakyLedger {
        async fn provision(
            &self,
            _ctx: &RequestContext,
            _tenant: &Tenant,
            network: Network,
            bootstrap_amount: i64,
        ) -> Result<DistributionAccount> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(token) = &self.cancel_on_call {
                token.cancel();
            }
            if call < self.failures {
                return Err(TenantryError::Ledger("horizon unavailable".into()));
            }
            Ok(DistributionAccount {
                address: ACCOUNT.into(),
                network,
                network_passphrase: network.passphrase().into(),
                bootstrap_amount,
            })
        }
    }

    fn new_tenant(name: &str) -> NewTenant {
        NewTenant {
            name: name.into(),
            owner_first_name: "First".into(),
            owner_last_name: "Last".into(),
            owner_email: "email@email.com".into(),
            organization_name: "My Org".into(),
        }
    }

    fn options() -> ProvisioningOptions {
        ProvisioningOptions { password_hash_cost: 4, ..ProvisioningOptions::default() }
    }

    fn manager(dir: &std::path::Path, ledger: Arc<dyn DistributionAccountProvisioner>, with_email: bool) -> ProvisioningManager {
        let dispatcher = MessageDispatcher::new(Arc::new(ChannelRegistry::new()));
        if with_email {
            dispatcher.register_client(MessageChannel::Email, Arc::new(DryRunClient::new(MessageChannel::Email)));
        }
        ProvisioningManager::new(
            Arc::new(PlatformDb::open_in_memory().unwrap()),
            NamespaceStore::new(dir),
            ledger,
            dispatcher,
            options(),
        )
    }

    #[test]
    fn test_validate_tenant_name() {
        for ok in ["myorg", "my-org", "a", "a-", "abc-def-ghi"] {
            assert!(validate_tenant_name(ok).is_ok(), "{ok}");
        }
        for bad in ["", "MyOrg", "my_org", "-org", "org1", "my org", "ørg"] {
            let err = validate_tenant_name(bad).unwrap_err();
            assert_eq!(
                err.to_string(),
                format!("invalid tenant name \"{bad}\". It should only contains lower case letters and dash (-)")
            );
        }
    }

    #[test]
    fn test_options_reject_small_bootstrap_amount() {
        let opts = ProvisioningOptions { bootstrap_amount: 4, ..options() };
        assert!(matches!(opts.validate(), Err(TenantryError::Validation(_))));
    }

    #[test]
    fn test_options_reject_sender_for_wrong_channel() {
        let opts = ProvisioningOptions { email_sender_type: MessengerType::HttpSms, ..options() };
        assert!(opts.validate().is_err());
        let opts = ProvisioningOptions { sms_sender_type: Some(MessengerType::Smtp), ..options() };
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_validate_tenant_name_length() {
        let longest = "a".repeat(MAX_TENANT_NAME_LEN);
        assert!(validate_tenant_name(&longest).is_ok());
        assert_eq!(crate::namespace::schema_name_for(&longest).len(), MAX_SCHEMA_NAME_LEN);

        let err = validate_tenant_name(&"a".repeat(MAX_TENANT_NAME_LEN + 1)).unwrap_err();
        assert!(matches!(err, TenantryError::Validation(_)));
        assert!(err.to_string().contains("at most 59 characters"));
    }

    #[test]
    fn test_options_reject_password_hash_cost_out_of_range() {
        for cost in [0, 3, 32] {
            let opts = ProvisioningOptions { password_hash_cost: cost, ..options() };
            assert!(matches!(opts.validate(), Err(TenantryError::Validation(_))), "{cost}");
        }
        for cost in [4, 31] {
            let opts = ProvisioningOptions { password_hash_cost: cost, ..options() };
            assert!(opts.validate().is_ok(), "{cost}");
        }
    }

    #[test]
    fn test_hash_failure_is_not_a_validation_error() {
        let err = hash_password("secret", 3).unwrap_err();
        assert!(matches!(err, TenantryError::PasswordHash(_)));
        let err = TenantryError::stage(ProvisioningStage::CreateOwner, err);
        assert_eq!(err.failed_stage(), Some(ProvisioningStage::CreateOwner));
    }

    #[tokio::test]
    async fn test_bad_hash_cost_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FlakyLedger::new(0);
        let mut m = manager(dir.path(), ledger.clone(), true);
        m.options.password_hash_cost = 3;

        let err = m.provision_tenant(&RequestContext::background(), &new_tenant("costly")).await.unwrap_err();
        assert!(matches!(err, TenantryError::Validation(_)));
        assert!(m.db().get_tenant_by_name("costly").unwrap().is_none());
        assert!(!m.namespaces().exists("sdp_costly"));
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_overlong_name_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path(), FlakyLedger::new(0), true);
        let name = "a".repeat(300);

        let err = m.provision_tenant(&RequestContext::background(), &new_tenant(&name)).await.unwrap_err();
        assert!(matches!(err, TenantryError::Validation(_)));
        assert!(m.db().list_tenants().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_name_has_no_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path(), FlakyLedger::new(0), true);

        let err = m.provision_tenant(&RequestContext::background(), &new_tenant("My_Org")).await.unwrap_err();
        assert!(matches!(err, TenantryError::Validation(_)));
        assert!(m.db().list_tenants().unwrap().is_empty());
        assert!(!m.namespaces().exists("sdp_My_Org"));
    }

    #[tokio::test]
    async fn test_provision_activates_tenant_and_records_welcome() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path(), FlakyLedger::new(0), true);

        let tenant = m.provision_tenant(&RequestContext::background(), &new_tenant("myorg")).await.unwrap();
        assert_eq!(tenant.status, TenantStatus::Active);
        assert_eq!(tenant.distribution_account.as_deref(), Some(ACCOUNT));
        assert_eq!(tenant.ui_base_url.as_deref(), Some("http://localhost:3000"));
        assert_eq!(tenant.email_sender_type.as_deref(), Some("dry_run"));

        let ns = m.namespaces().open("sdp_myorg").unwrap();
        let owner = ns.get_user_by_email("email@email.com").unwrap().unwrap();
        assert!(owner.is_owner);
        assert_eq!(ns.organization_name().unwrap().as_deref(), Some("My Org"));
        assert_eq!(
            ns.list_messages().unwrap(),
            vec![("email".to_string(), "email@email.com".to_string(), "Welcome to My Org".to_string())]
        );
    }

    #[tokio::test]
    async fn test_welcome_failure_does_not_fail_provisioning() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path(), FlakyLedger::new(0), false);

        let tenant = m.provision_tenant(&RequestContext::background(), &new_tenant("quiet")).await.unwrap();
        assert_eq!(tenant.status, TenantStatus::Active);
        let ns = m.namespaces().open("sdp_quiet").unwrap();
        assert!(ns.list_messages().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ledger_failure_names_stage_and_resume_finishes() {
        let dir = tempfile::tempdir().unwrap();
        let ledger = FlakyLedger::new(1);
        let m = manager(dir.path(), ledger.clone(), true);
        let ctx = RequestContext::background();

        let err = m.provision_tenant(&ctx, &new_tenant("flaky")).await.unwrap_err();
        assert_eq!(err.failed_stage(), Some(ProvisioningStage::ProvisionDistributionAccount));
        assert!(err.to_string().starts_with("provision distribution account: "));

        let stuck = m.db().get_tenant_by_name("flaky").unwrap().unwrap();
        assert_eq!(stuck.status, TenantStatus::Provisioning);
        assert!(m.namespaces().exists("sdp_flaky"));

        // Plain re-invocation still hits the uniqueness guard.
        let err = m.provision_tenant(&ctx, &new_tenant("flaky")).await.unwrap_err();
        assert!(err.is_duplicate_tenant());

        let tenant = m.resume_tenant(&ctx, "flaky", &new_tenant("flaky").owner()).await.unwrap();
        assert_eq!(tenant.id, stuck.id);
        assert_eq!(tenant.status, TenantStatus::Active);
        assert_eq!(ledger.calls.load(Ordering::SeqCst), 2);
        assert_eq!(m.db().list_tenants().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resume_with_different_owner_email_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path(), FlakyLedger::new(0), true);
        let ctx = RequestContext::background();
        let tenant = m.provision_tenant(&ctx, &new_tenant("half")).await.unwrap();
        m.db().update_tenant_status(&tenant.id, TenantStatus::Provisioning).unwrap();

        let typo = NewOwner { email: "typo@email.com".into(), ..new_tenant("half").owner() };
        let err = m.resume_tenant(&ctx, "half", &typo).await.unwrap_err();
        assert!(matches!(err, TenantryError::Validation(_)));

        let ns = m.namespaces().open("sdp_half").unwrap();
        assert!(ns.get_user_by_email("typo@email.com").unwrap().is_none());
        assert_eq!(ns.get_owner().unwrap().unwrap().email, "email@email.com");
        assert_eq!(m.db().get_tenant_by_name("half").unwrap().unwrap().status, TenantStatus::Provisioning);

        // Resuming with the original owner still finishes the tenant.
        let tenant = m.resume_tenant(&ctx, "half", &new_tenant("half").owner()).await.unwrap();
        assert_eq!(tenant.status, TenantStatus::Active);
    }

    #[tokio::test]
    async fn test_resume_rejects_active_and_unknown_tenants() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path(), FlakyLedger::new(0), true);
        let ctx = RequestContext::background();
        m.provision_tenant(&ctx, &new_tenant("done")).await.unwrap();

        let owner = new_tenant("done").owner();
        assert!(matches!(m.resume_tenant(&ctx, "done", &owner).await, Err(TenantryError::Validation(_))));
        assert!(matches!(m.resume_tenant(&ctx, "ghost", &owner).await, Err(TenantryError::Validation(_))));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let m = manager(dir.path(), FlakyLedger::new(0), true);
        let token = CancellationToken::new();
        token.cancel();
        let ctx = RequestContext::background().with_cancellation(token);

        let err = m.provision_tenant(&ctx, &new_tenant("early")).await.unwrap_err();
        assert!(matches!(err, TenantryError::Cancelled));
        assert!(m.db().get_tenant_by_name("early").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancellation_stops_between_steps() {
        let dir = tempfile::tempdir().unwrap();
        let token = CancellationToken::new();
        let m = manager(dir.path(), FlakyLedger::cancelling(token.clone()), true);
        let ctx = RequestContext::background().with_cancellation(token);

        let err = m.provision_tenant(&ctx, &new_tenant("halted")).await.unwrap_err();
        assert!(matches!(err, TenantryError::Cancelled));

        // The ledger step finished; nothing after it ran.
        let tenant = m.db().get_tenant_by_name("halted").unwrap().unwrap();
        assert_eq!(tenant.status, TenantStatus::Provisioning);
        assert_eq!(tenant.distribution_account.as_deref(), Some(ACCOUNT));
        let ns = m.namespaces().open("sdp_halted").unwrap();
        assert!(ns.list_assets().unwrap().is_empty());
        assert!(ns.get_user_by_email("email@email.com").unwrap().is_none());
    }

    #[test]
    fn test_welcome_message_links_to_ui() {
        let db = PlatformDb::open_in_memory().unwrap();
        let tenant = db.add_tenant("myorg", "My Org").unwrap();
        let owner = TenantUser {
            id: "u".into(), first_name: "First".into(), last_name: "Last".into(),
            email: "email@email.com".into(), roles: vec![], is_owner: true,
        };
        let msg = welcome_message(&tenant, &owner, "https://myorg.example.org/");
        assert_eq!(msg.title, "Welcome to My Org");
        assert!(msg.body.contains("Hello First"));
        assert!(msg.body.contains("https://myorg.example.org/forgot-password"));
        assert_eq!(msg.to_email.as_deref(), Some("email@email.com"));
    }

    #[test]
    fn test_welcome_message_escapes_markup() {
        let db = PlatformDb::open_in_memory().unwrap();
        let tenant = db.add_tenant("myorg", "Acme & <Sons>").unwrap();
        let owner = TenantUser {
            id: "u".into(), first_name: "<script>alert(1)</script>".into(), last_name: "Last".into(),
            email: "email@email.com".into(), roles: vec![], is_owner: true,
        };
        let msg = welcome_message(&tenant, &owner, "https://myorg.example.org");
        assert!(!msg.body.contains("<script>"));
        assert!(msg.body.contains("Hello &lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(msg.body.contains("owner of Acme &amp; &lt;Sons&gt;"));
        assert_eq!(msg.title, "Welcome to Acme & <Sons>");
    }
}
