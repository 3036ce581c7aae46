// ABOUTME: Lifecycle orchestration across storage, artifact store, and sandbox driver
// ABOUTME: All mutations of a bot's row and container handle are serialized per bot

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use botdock_artifacts::ArtifactStore;
use botdock_models::{Bot, BotRuntime, BotStatus, User};
use botdock_sandbox::{CreateSpec, SandboxDriver};
use botdock_security::{validate_bot_name, validate_start_command};
use botdock_storage::audit::AuditEntry;
use botdock_storage::bots::BotCreateInput;
use botdock_storage::DbState;

use crate::{LifecycleError, Result};

/// Request to create a new bot
#[derive(Debug, Clone)]
pub struct CreateBotInput {
    pub name: String,
    pub runtime: BotRuntime,
    pub start_cmd: Option<String>,
    pub plan_id: i64,
}

type LockMap = Mutex<HashMap<i64, Arc<Mutex<()>>>>;

/// The control plane for bots.
///
/// Every operation checks existence and ownership first; tenant
/// cross-access is reported as Forbidden without leaking anything about
/// the bot. Mutating operations hold the bot's lock so DB writes and
/// driver calls for one bot never interleave.
pub struct LifecycleManager {
    db: DbState,
    artifacts: ArtifactStore,
    driver: Arc<SandboxDriver>,
    bot_locks: LockMap,
    owner_locks: LockMap,
}

impl LifecycleManager {
    pub fn new(db: DbState, artifacts: ArtifactStore, driver: Arc<SandboxDriver>) -> Self {
        Self {
            db,
            artifacts,
            driver,
            bot_locks: Mutex::new(HashMap::new()),
            owner_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for(map: &LockMap, key: i64) -> Arc<Mutex<()>> {
        let mut locks = map.lock().await;
        locks.entry(key).or_default().clone()
    }

    /// Fetch a bot, verifying it exists and the actor owns it
    pub async fn owned_bot(&self, user: &User, bot_id: i64) -> Result<Bot> {
        let bot = self
            .db
            .bots
            .get(bot_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound("Bot not found".to_string()))?;

        if bot.user_id != user.id {
            return Err(LifecycleError::Forbidden(
                "You don't have access to this bot".to_string(),
            ));
        }

        Ok(bot)
    }

    /// Create a bot row and its artifact directory
    pub async fn create_bot(&self, user: &User, ip: &str, input: CreateBotInput) -> Result<Bot> {
        if !validate_bot_name(&input.name) {
            return Err(LifecycleError::Validation(
                "Invalid bot name. Use 3-50 alphanumeric characters, hyphens, or underscores."
                    .to_string(),
            ));
        }

        if let Some(cmd) = input.start_cmd.as_deref() {
            if !validate_start_command(cmd) {
                return Err(LifecycleError::Validation(
                    "Invalid start command. Command contains dangerous patterns.".to_string(),
                ));
            }
        }

        let plan = self
            .db
            .plans
            .get(input.plan_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound("Plan not found".to_string()))?;

        // Quota and name checks race against other creates by the same
        // owner, so serialize them per owner
        let owner_lock = Self::lock_for(&self.owner_locks, user.id).await;
        let _guard = owner_lock.lock().await;

        let bot_count = self.db.bots.count_for_user(user.id).await?;
        if bot_count >= plan.max_bots {
            return Err(LifecycleError::Conflict(format!(
                "Bot limit reached. Your plan allows maximum {} bots.",
                plan.max_bots
            )));
        }

        if self
            .db
            .bots
            .find_by_owner_and_name(user.id, &input.name)
            .await?
            .is_some()
        {
            return Err(LifecycleError::Conflict(
                "A bot with this name already exists".to_string(),
            ));
        }

        let bot = self
            .db
            .bots
            .create(BotCreateInput {
                user_id: user.id,
                plan_id: input.plan_id,
                runtime: input.runtime,
                name: input.name,
                start_cmd: input.start_cmd,
            })
            .await?;

        self.artifacts.bot_dir(bot.id)?;

        self.audit(user.id, "bot_create", &bot.id.to_string(), ip, None)
            .await;
        info!("User {} created bot {}", user.id, bot.id);

        Ok(bot)
    }

    /// All bots owned by the actor, reconciled against the sandbox
    /// runtime: a bot recorded as RUNNING whose container is observed
    /// CRASHED is persisted as CRASHED before the listing is returned.
    pub async fn list_bots(&self, user: &User) -> Result<Vec<Bot>> {
        let mut bots = self.db.bots.list_for_user(user.id).await?;

        for bot in &mut bots {
            if bot.status != BotStatus::Running {
                continue;
            }
            let Some(handle) = bot.container_id.as_deref() else {
                continue;
            };

            match self.driver.status(handle).await {
                Ok(BotStatus::Crashed) => {
                    self.db.bots.set_status(bot.id, BotStatus::Crashed).await?;
                    bot.status = BotStatus::Crashed;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("Could not reconcile status for bot {}: {}", bot.id, e);
                }
            }
        }

        Ok(bots)
    }

    /// Replace a bot's source tree with an uploaded payload
    pub async fn upload(
        &self,
        user: &User,
        ip: &str,
        bot_id: i64,
        client_filename: String,
        payload: Vec<u8>,
    ) -> Result<String> {
        let bot = self.owned_bot(user, bot_id).await?;

        let bot_lock = Self::lock_for(&self.bot_locks, bot_id).await;
        let _guard = bot_lock.lock().await;

        let store = self.artifacts.clone();
        let runtime = bot.runtime;
        let (filename, source_type) =
            tokio::task::spawn_blocking(move || store.ingest(bot_id, &client_filename, &payload, runtime))
                .await
                .map_err(|e| LifecycleError::Internal(e.to_string()))??;

        self.db.bots.set_source_type(bot_id, source_type).await?;

        self.audit(
            user.id,
            "bot_upload",
            &bot_id.to_string(),
            ip,
            Some(&format!("Uploaded {}", filename)),
        )
        .await;
        info!("User {} uploaded files to bot {}", user.id, bot_id);

        Ok(filename)
    }

    /// Start a bot, creating its container on first start.
    ///
    /// Any failure after the preconditions transitions the bot to CRASHED
    /// and surfaces the driver's message.
    pub async fn start(&self, user: &User, ip: &str, bot_id: i64) -> Result<Bot> {
        let bot = self.owned_bot(user, bot_id).await?;

        let plan = self
            .db
            .plans
            .get(bot.plan_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound("Plan not found".to_string()))?;

        if self.artifacts.is_empty(bot_id)? {
            return Err(LifecycleError::Validation(
                "No files uploaded. Please upload bot code first.".to_string(),
            ));
        }

        let bot_lock = Self::lock_for(&self.bot_locks, bot_id).await;
        let _guard = bot_lock.lock().await;

        // A bot that never got a container stays CREATED on failure, so a
        // null handle always means CREATED
        let handle = match bot.container_id.clone() {
            Some(handle) => handle,
            None => match self.create_sandbox(&bot, &plan.cpu_limit, &plan.ram_limit).await {
                Ok(handle) => handle,
                Err(e) => {
                    return Err(LifecycleError::Validation(format!(
                        "Failed to start bot: {}",
                        e
                    )))
                }
            },
        };

        match self.driver.start(&handle).await {
            Ok(()) => {
                self.db.bots.set_status(bot_id, BotStatus::Running).await?;
                self.audit(user.id, "bot_start", &bot_id.to_string(), ip, None)
                    .await;
                info!("User {} started bot {}", user.id, bot_id);
                self.refreshed(bot_id).await
            }
            Err(e) => {
                self.db.bots.set_status(bot_id, BotStatus::Crashed).await?;
                Err(LifecycleError::Validation(format!(
                    "Failed to start bot: {}",
                    e
                )))
            }
        }
    }

    async fn create_sandbox(&self, bot: &Bot, cpu_limit: &str, ram_limit: &str) -> Result<String> {
        let artifact_dir = self.artifacts.bot_dir(bot.id)?;
        let handle = self
            .driver
            .create(CreateSpec {
                bot_id: bot.id,
                runtime: bot.runtime,
                start_cmd: bot.start_cmd.as_deref(),
                cpu_limit,
                ram_limit,
                artifact_dir: &artifact_dir,
            })
            .await?;
        self.db
            .bots
            .set_container_id(bot.id, Some(&handle))
            .await?;
        Ok(handle)
    }

    /// Stop a bot's container gracefully. Driver failure leaves the
    /// persisted state untouched.
    pub async fn stop(&self, user: &User, ip: &str, bot_id: i64) -> Result<Bot> {
        let bot = self.owned_bot(user, bot_id).await?;
        let handle = bot
            .container_id
            .as_deref()
            .ok_or_else(|| LifecycleError::Validation("Bot has no container".to_string()))?;

        let bot_lock = Self::lock_for(&self.bot_locks, bot_id).await;
        let _guard = bot_lock.lock().await;

        self.driver.stop(handle, None).await?;

        self.db.bots.set_status(bot_id, BotStatus::Stopped).await?;
        self.audit(user.id, "bot_stop", &bot_id.to_string(), ip, None)
            .await;
        info!("User {} stopped bot {}", user.id, bot_id);

        self.refreshed(bot_id).await
    }

    /// Restart a bot's container. Driver failure leaves the persisted
    /// state untouched.
    pub async fn restart(&self, user: &User, ip: &str, bot_id: i64) -> Result<Bot> {
        let bot = self.owned_bot(user, bot_id).await?;
        let handle = bot
            .container_id
            .as_deref()
            .ok_or_else(|| LifecycleError::Validation("Bot has no container".to_string()))?;

        let bot_lock = Self::lock_for(&self.bot_locks, bot_id).await;
        let _guard = bot_lock.lock().await;

        self.driver.restart(handle, None).await?;

        self.db.bots.set_status(bot_id, BotStatus::Running).await?;
        self.audit(user.id, "bot_restart", &bot_id.to_string(), ip, None)
            .await;
        info!("User {} restarted bot {}", user.id, bot_id);

        self.refreshed(bot_id).await
    }

    /// Delete a bot: container (force), artifact directory, then the row.
    /// Leaves no orphans; a failed container removal aborts the delete.
    pub async fn delete(&self, user: &User, ip: &str, bot_id: i64) -> Result<()> {
        let bot = self.owned_bot(user, bot_id).await?;

        let bot_lock = Self::lock_for(&self.bot_locks, bot_id).await;
        let _guard = bot_lock.lock().await;

        if let Some(handle) = bot.container_id.as_deref() {
            self.driver.remove(handle, true).await?;
        }

        self.artifacts.remove(bot_id)?;
        self.db.bots.delete(bot_id).await?;

        drop(_guard);
        self.bot_locks.lock().await.remove(&bot_id);

        self.audit(user.id, "bot_delete", &bot_id.to_string(), ip, None)
            .await;
        info!("User {} deleted bot {}", user.id, bot_id);

        Ok(())
    }

    /// The sandbox driver, for read-only log access by the broker
    pub fn driver(&self) -> &SandboxDriver {
        &self.driver
    }

    async fn refreshed(&self, bot_id: i64) -> Result<Bot> {
        self.db
            .bots
            .get(bot_id)
            .await?
            .ok_or_else(|| LifecycleError::NotFound("Bot not found".to_string()))
    }

    /// Audit writes never mask the outcome of the operation they record
    async fn audit(&self, user_id: i64, action: &str, target: &str, ip: &str, details: Option<&str>) {
        let entry = AuditEntry {
            user_id: Some(user_id),
            action,
            target_id: Some(target),
            ip_address: Some(ip),
            details,
        };
        if let Err(e) = self.db.audit.record(entry).await {
            warn!("Failed to write audit log for {}: {}", action, e);
        }
    }
}
