//! Per-member role reconciliation.
//!
//! The fail-open rule governs this whole module: when the chain or the
//! price provider is unreachable, the member keeps every role they
//! currently hold. Role removal happens only on positive evidence that
//! no enabled rule for that role is satisfied.

use std::collections::BTreeSet;

use chain::SnapshotSlices;
use db::{
    audit_entry, gating_rule, wallet_link, ColumnTrait, DbErr, EntityTrait, QueryFilter,
    QuerySelect,
};
use derive_more::{Display, Error, From};
use futures_util::{stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::{
    evaluate::{decide, evaluate, Evaluation, Outcome, RuleInput},
    Worker,
};

/// Errors that may occur during role reconciliation.
#[derive(Debug, Display, Error, From)]
pub enum SyncError {
    /// Database-related error.
    DatabaseError(DbErr),

    /// Chat platform error outside of the silently-skipped
    /// resolution path.
    ChatError(discord::ChatError),
}

impl Worker {
    /// Reconcile every guild that has at least one enabled rule.
    pub(crate) async fn reconcile_all(&self) -> Result<(), SyncError> {
        let guild_ids: Vec<i64> = gating_rule::Entity::find()
            .select_only()
            .column(gating_rule::Column::GuildId)
            .filter(gating_rule::Column::Enabled.eq(true))
            .distinct()
            .into_tuple()
            .all(&self.db)
            .await?;

        info!(guilds = guild_ids.len(), "starting reconciliation cycle");

        for guild_id in guild_ids {
            if let Err(error) = self.check_guild(guild_id).await {
                error!(%error, guild_id, "guild reconciliation failed");
            }
        }

        Ok(())
    }

    /// Reconcile every linked member of one guild.
    ///
    /// Rules are loaded once; per-member checks fan out over a bounded
    /// pool of concurrent futures.
    pub(crate) async fn check_guild(&self, guild_id: i64) -> Result<(), SyncError> {
        let rules = enabled_rules(self, guild_id).await?;

        if rules.is_empty() {
            debug!(guild_id, "no enabled rules, skipping guild");
            return Ok(());
        }

        let links = wallet_link::Entity::find()
            .filter(wallet_link::Column::GuildId.eq(guild_id))
            .all(&self.db)
            .await?;

        stream::iter(links)
            .for_each_concurrent(self.concurrency, |link| {
                let rules = &rules;

                async move {
                    if let Err(error) = self.check_link(rules, &link).await {
                        error!(%error, guild_id, member_id = link.member_id, "member check failed");
                    }
                }
            })
            .await;

        Ok(())
    }

    /// Reconcile a single member on demand.
    pub(crate) async fn check_member(&self, guild_id: i64, member_id: i64) -> Result<(), SyncError> {
        let Some(link) = wallet_link::Entity::find()
            .filter(wallet_link::Column::GuildId.eq(guild_id))
            .filter(wallet_link::Column::MemberId.eq(member_id))
            .one(&self.db)
            .await?
        else {
            debug!(guild_id, member_id, "no wallet link, nothing to recheck");
            return Ok(());
        };

        let rules = enabled_rules(self, guild_id).await?;

        self.check_link(&rules, &link).await
    }

    /// Evaluate one wallet link against preloaded rules and apply
    /// the resulting role decisions.
    pub(crate) async fn check_link(
        &self,
        rules: &[gating_rule::Model],
        link: &wallet_link::Model,
    ) -> Result<(), SyncError> {
        let inputs = rule_inputs(rules);

        // USD rules need quotes; a provider outage merely leaves them
        // indeterminate for this check.
        let asset_ids: BTreeSet<String> = inputs
            .iter()
            .filter_map(|input| match &input.spec {
                db::gating_rule::RuleSpec::TokenUsd { price_asset_id, .. } => {
                    Some(price_asset_id.clone())
                }
                _ => None,
            })
            .collect();

        let prices = match self.prices.usd_prices(&asset_ids).await {
            Ok(prices) => prices,
            Err(error) => {
                warn!(%error, "price lookup failed, treating usd rules as indeterminate");
                Default::default()
            }
        };

        // Resolution failures are silent: the guild may have kicked the
        // bot or the member may have left between cycles.
        match self.chat.guild_exists(link.guild_id as u64).await {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                debug!(guild_id = link.guild_id, "guild did not resolve, skipping");
                return Ok(());
            }
        }

        let held_roles = match self
            .chat
            .member_roles(link.guild_id as u64, link.member_id as u64)
            .await
        {
            Ok(Some(roles)) => roles,
            Ok(None) | Err(_) => {
                debug!(
                    guild_id = link.guild_id,
                    member_id = link.member_id,
                    "member did not resolve, skipping"
                );
                return Ok(());
            }
        };

        let slices = needed_slices(&inputs);

        let snapshot = match self.holdings.snapshot(&link.wallet_pubkey, slices).await {
            Ok(snapshot) => snapshot,
            Err(error) => {
                // Fail-open: advance the checkpoint and leave roles as-is.
                warn!(%error, wallet = %link.wallet_pubkey, "snapshot failed, keeping roles");
                self.touch_last_checked(link.id).await?;
                return Ok(());
            }
        };

        let evaluations = evaluate(&inputs, &snapshot, &prices);

        for decision in decide(&evaluations) {
            let role_id = decision.role_id;
            let has_role = held_roles.contains(&(role_id as u64));

            match decision.should_have {
                Outcome::Indeterminate => {}
                Outcome::Satisfied if !has_role => {
                    self.grant_role(link, role_id, &decision.matched_rule_ids, &evaluations)
                        .await?;
                }
                Outcome::Unsatisfied if has_role => {
                    self.revoke_role(
                        link.guild_id,
                        link.member_id,
                        role_id,
                        "no active rule satisfied for role",
                    )
                    .await?;
                }
                _ => {}
            }
        }

        self.touch_last_checked(link.id).await?;

        Ok(())
    }

    /// Strip every rule-managed role from a member whose wallet was
    /// unlinked. Considers all rules, disabled ones included: a role
    /// granted under a rule that was later disabled is still managed.
    pub(crate) async fn remove_managed_roles_for_member(
        &self,
        guild_id: i64,
        member_id: i64,
    ) -> Result<(), SyncError> {
        let role_ids: Vec<i64> = gating_rule::Entity::find()
            .select_only()
            .column(gating_rule::Column::RoleId)
            .filter(gating_rule::Column::GuildId.eq(guild_id))
            .distinct()
            .into_tuple()
            .all(&self.db)
            .await?;

        let Some(held_roles) = self
            .chat
            .member_roles(guild_id as u64, member_id as u64)
            .await?
        else {
            debug!(guild_id, member_id, "member did not resolve, nothing to remove");
            return Ok(());
        };

        for role_id in role_ids {
            if held_roles.contains(&(role_id as u64)) {
                self.revoke_role(guild_id, member_id, role_id, "wallet unlinked")
                    .await?;
            }
        }

        Ok(())
    }

    /// Grant a role after passing the manageability gate, auditing the
    /// first matched rule's reason.
    async fn grant_role(
        &self,
        link: &wallet_link::Model,
        role_id: i64,
        matched_rule_ids: &[i64],
        evaluations: &[Evaluation],
    ) -> Result<(), SyncError> {
        if !self.manageable(link.guild_id, role_id).await {
            return Ok(());
        }

        let matched_rule_id = matched_rule_ids.first().copied();
        let reason = matched_rule_id
            .and_then(|rule_id| {
                evaluations
                    .iter()
                    .find(|eval| eval.rule_id == rule_id)
                    .map(|eval| eval.reason.clone())
            })
            .unwrap_or_else(|| String::from("rule satisfied"));

        if let Err(error) = self
            .chat
            .add_role(
                link.guild_id as u64,
                link.member_id as u64,
                role_id as u64,
                &reason,
            )
            .await
        {
            error!(%error, role_id, "unable to add role");
            return Ok(());
        }

        audit_entry::Entity::insert(audit_entry::record(
            link.guild_id,
            link.member_id,
            matched_rule_id,
            Some(role_id),
            audit_entry::Action::RoleAdded,
            reason,
        ))
        .exec_without_returning(&self.db)
        .await?;

        Ok(())
    }

    /// Revoke a role after passing the manageability gate.
    async fn revoke_role(
        &self,
        guild_id: i64,
        member_id: i64,
        role_id: i64,
        reason: &str,
    ) -> Result<(), SyncError> {
        if !self.manageable(guild_id, role_id).await {
            return Ok(());
        }

        if let Err(error) = self
            .chat
            .remove_role(guild_id as u64, member_id as u64, role_id as u64, reason)
            .await
        {
            error!(%error, role_id, "unable to remove role");
            return Ok(());
        }

        audit_entry::Entity::insert(audit_entry::record(
            guild_id,
            member_id,
            None,
            Some(role_id),
            audit_entry::Action::RoleRemoved,
            reason,
        ))
        .exec_without_returning(&self.db)
        .await?;

        Ok(())
    }

    /// Manageability gate shared by every mutation path. An error while
    /// checking counts as "not manageable" for this role only.
    async fn manageable(&self, guild_id: i64, role_id: i64) -> bool {
        match self.chat.can_manage_role(guild_id as u64, role_id as u64).await {
            Ok(true) => true,
            Ok(false) => {
                info!(guild_id, role_id, "role is not manageable by the bot, skipping");
                false
            }
            Err(error) => {
                error!(%error, guild_id, role_id, "manageability check failed, skipping role");
                false
            }
        }
    }

    /// Record that a per-member evaluation completed, successful or
    /// fail-open.
    async fn touch_last_checked(&self, link_id: i64) -> Result<(), DbErr> {
        let now = db::now();

        wallet_link::Entity::update_many()
            .col_expr(wallet_link::Column::LastCheckedAt, now.into())
            .col_expr(wallet_link::Column::UpdatedAt, now.into())
            .filter(wallet_link::Column::Id.eq(link_id))
            .exec(&self.db)
            .await?;

        Ok(())
    }
}

async fn enabled_rules(worker: &Worker, guild_id: i64) -> Result<Vec<gating_rule::Model>, DbErr> {
    gating_rule::Entity::find()
        .filter(gating_rule::Column::GuildId.eq(guild_id))
        .filter(gating_rule::Column::Enabled.eq(true))
        .all(&worker.db)
        .await
}

/// Narrow stored rows to evaluator inputs, dropping rows that are
/// missing a column their kind requires.
fn rule_inputs(rules: &[gating_rule::Model]) -> Vec<RuleInput> {
    rules
        .iter()
        .filter_map(|rule| match rule.spec() {
            Ok(spec) => Some(RuleInput {
                rule_id: rule.id,
                role_id: rule.role_id,
                spec,
            }),
            Err(error) => {
                warn!(%error, "skipping malformed rule row");
                None
            }
        })
        .collect()
}

/// Snapshot slices actually required by the rule set.
fn needed_slices(inputs: &[RuleInput]) -> SnapshotSlices {
    use db::gating_rule::RuleSpec;

    let mut slices = SnapshotSlices::empty();

    for input in inputs {
        match input.spec {
            RuleSpec::TokenAmount { .. } | RuleSpec::TokenUsd { .. } => {
                slices.include_tokens = true
            }
            RuleSpec::NftCollection { .. } => slices.include_nfts = true,
        }
    }

    slices
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{BTreeSet, HashMap, HashSet},
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use chain::{
        CallError, HoldingsProvider, SnapshotSlices, UpstreamUnavailable, WalletSnapshot,
    };
    use db::{
        audit_entry, gating_rule, wallet_link, ActiveValue, Database, DatabaseConnection, Decimal,
        EntityTrait, PaginatorTrait,
    };
    use discord::{ChatError, ChatPlatform};
    use migration::MigratorTrait;
    use prices::{PriceError, PriceLookup};

    use crate::Worker;

    #[derive(Default)]
    struct MockChat {
        held: Mutex<HashMap<(u64, u64), HashSet<u64>>>,
        unmanageable: HashSet<u64>,
        missing_members: HashSet<(u64, u64)>,
        added: Mutex<Vec<u64>>,
        removed: Mutex<Vec<u64>>,
    }

    impl MockChat {
        fn with_roles(guild_id: u64, member_id: u64, roles: &[u64]) -> Self {
            let chat = Self::default();

            chat.held
                .lock()
                .unwrap()
                .insert((guild_id, member_id), roles.iter().copied().collect());

            chat
        }
    }

    #[async_trait]
    impl ChatPlatform for MockChat {
        async fn guild_exists(&self, _guild_id: u64) -> Result<bool, ChatError> {
            Ok(true)
        }

        async fn member_roles(
            &self,
            guild_id: u64,
            member_id: u64,
        ) -> Result<Option<Vec<u64>>, ChatError> {
            if self.missing_members.contains(&(guild_id, member_id)) {
                return Ok(None);
            }

            Ok(Some(
                self.held
                    .lock()
                    .unwrap()
                    .get(&(guild_id, member_id))
                    .map(|roles| roles.iter().copied().collect())
                    .unwrap_or_default(),
            ))
        }

        async fn can_manage_role(&self, _guild_id: u64, role_id: u64) -> Result<bool, ChatError> {
            Ok(!self.unmanageable.contains(&role_id))
        }

        async fn add_role(
            &self,
            guild_id: u64,
            member_id: u64,
            role_id: u64,
            _reason: &str,
        ) -> Result<(), ChatError> {
            self.held
                .lock()
                .unwrap()
                .entry((guild_id, member_id))
                .or_default()
                .insert(role_id);
            self.added.lock().unwrap().push(role_id);

            Ok(())
        }

        async fn remove_role(
            &self,
            guild_id: u64,
            member_id: u64,
            role_id: u64,
            _reason: &str,
        ) -> Result<(), ChatError> {
            self.held
                .lock()
                .unwrap()
                .entry((guild_id, member_id))
                .or_default()
                .remove(&role_id);
            self.removed.lock().unwrap().push(role_id);

            Ok(())
        }
    }

    /// Returns a fixed snapshot, or fails like an exhausted retry
    /// schedule when none is set.
    struct MockHoldings {
        snapshot: Option<WalletSnapshot>,
    }

    #[async_trait]
    impl HoldingsProvider for MockHoldings {
        async fn snapshot(
            &self,
            wallet: &str,
            _slices: SnapshotSlices,
        ) -> Result<WalletSnapshot, UpstreamUnavailable> {
            match &self.snapshot {
                Some(snapshot) => Ok(WalletSnapshot {
                    wallet: wallet.to_owned(),
                    ..snapshot.clone()
                }),
                None => Err(UpstreamUnavailable {
                    attempts: 4,
                    source: CallError::RpcError {
                        code: -32000,
                        message: String::from("node is behind"),
                    },
                }),
            }
        }
    }

    struct MockPrices {
        quotes: Option<HashMap<String, Decimal>>,
    }

    #[async_trait]
    impl PriceLookup for MockPrices {
        async fn usd_prices(
            &self,
            asset_ids: &BTreeSet<String>,
        ) -> Result<HashMap<String, Decimal>, PriceError> {
            match &self.quotes {
                Some(quotes) => Ok(asset_ids
                    .iter()
                    .filter_map(|id| quotes.get(id).map(|price| (id.clone(), *price)))
                    .collect()),
                None => Err(PriceError::DatabaseError(db::DbErr::Custom(String::from(
                    "provider is down",
                )))),
            }
        }
    }

    async fn create_database() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:")
            .await
            .expect("unable to create test database");

        migration::Migrator::up(&db, None)
            .await
            .expect("unable to run migrations");

        db
    }

    async fn seed_link(db: &DatabaseConnection, guild_id: i64, member_id: i64) -> i64 {
        db::guild::Entity::insert(db::guild::on_first_interaction(guild_id))
            .exec_without_returning(db)
            .await
            .expect("unable to create guild");

        wallet_link::Entity::insert(wallet_link::verified(
            guild_id,
            member_id,
            String::from("4Nd1mYvM4nGqyHvGVZFybmV1xuyWFQ5NTe3wfNHZshU7"),
        ))
        .exec_with_returning(db)
        .await
        .expect("unable to create wallet link")
        .id
    }

    async fn seed_token_rule(
        db: &DatabaseConnection,
        guild_id: i64,
        role_id: i64,
        threshold: &str,
        enabled: bool,
    ) -> i64 {
        let now = db::now();

        gating_rule::Entity::insert(gating_rule::ActiveModel {
            guild_id: ActiveValue::Set(guild_id),
            role_id: ActiveValue::Set(role_id),
            kind: ActiveValue::Set(gating_rule::RuleKind::TokenAmount),
            enabled: ActiveValue::Set(enabled),
            mint: ActiveValue::Set(Some(String::from("M"))),
            threshold_amount: ActiveValue::Set(Some(threshold.parse().unwrap())),
            threshold_usd: ActiveValue::Set(None),
            price_source: ActiveValue::Set(None),
            price_asset_id: ActiveValue::Set(None),
            collection_address: ActiveValue::Set(None),
            threshold_count: ActiveValue::Set(None),
            created_by: ActiveValue::Set(1),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        })
        .exec_with_returning(db)
        .await
        .expect("unable to create rule")
        .id
    }

    async fn seed_usd_rule(db: &DatabaseConnection, guild_id: i64, role_id: i64) {
        let now = db::now();

        gating_rule::Entity::insert(gating_rule::ActiveModel {
            guild_id: ActiveValue::Set(guild_id),
            role_id: ActiveValue::Set(role_id),
            kind: ActiveValue::Set(gating_rule::RuleKind::TokenUsd),
            enabled: ActiveValue::Set(true),
            mint: ActiveValue::Set(Some(String::from("M"))),
            threshold_amount: ActiveValue::Set(None),
            threshold_usd: ActiveValue::Set(Some("10".parse().unwrap())),
            price_source: ActiveValue::Set(Some(gating_rule::PriceSource::Coingecko)),
            price_asset_id: ActiveValue::Set(Some(String::from("sol"))),
            collection_address: ActiveValue::Set(None),
            threshold_count: ActiveValue::Set(None),
            created_by: ActiveValue::Set(1),
            created_at: ActiveValue::Set(now),
            updated_at: ActiveValue::Set(now),
            ..Default::default()
        })
        .exec_without_returning(db)
        .await
        .expect("unable to create rule");
    }

    fn build_worker(
        db: DatabaseConnection,
        chat: Arc<MockChat>,
        holdings: MockHoldings,
        quotes: Option<HashMap<String, Decimal>>,
    ) -> Arc<Worker> {
        Worker::new(
            db,
            chat,
            Arc::new(holdings),
            Arc::new(MockPrices { quotes }),
            &common::config::Worker::default(),
        )
    }

    async fn audit_count(db: &DatabaseConnection) -> u64 {
        audit_entry::Entity::find().count(db).await.unwrap()
    }

    #[tokio::test]
    async fn grants_missing_role_and_stays_idempotent() {
        let db = create_database().await;

        seed_link(&db, 1, 2).await;
        seed_token_rule(&db, 1, 10, "0", true).await;

        let chat = Arc::new(MockChat::default());
        let worker = build_worker(
            db.clone(),
            chat.clone(),
            MockHoldings {
                snapshot: Some(WalletSnapshot::default()),
            },
            Some(HashMap::new()),
        );

        worker.check_member(1, 2).await.unwrap();

        assert_eq!(*chat.added.lock().unwrap(), vec![10]);
        assert_eq!(audit_count(&db).await, 1);

        // A second run over unchanged state mutates nothing.
        worker.check_member(1, 2).await.unwrap();

        assert_eq!(chat.added.lock().unwrap().len(), 1);
        assert!(chat.removed.lock().unwrap().is_empty());
        assert_eq!(audit_count(&db).await, 1);
    }

    #[tokio::test]
    async fn revokes_role_when_no_rule_is_satisfied() {
        let db = create_database().await;

        seed_link(&db, 1, 2).await;
        seed_token_rule(&db, 1, 10, "5", true).await;

        let chat = Arc::new(MockChat::with_roles(1, 2, &[10]));
        let worker = build_worker(
            db.clone(),
            chat.clone(),
            MockHoldings {
                snapshot: Some(WalletSnapshot::default()),
            },
            Some(HashMap::new()),
        );

        worker.check_member(1, 2).await.unwrap();

        assert_eq!(*chat.removed.lock().unwrap(), vec![10]);

        let entries = audit_entry::Entity::find().all(&db).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, audit_entry::Action::RoleRemoved);
        assert_eq!(entries[0].reason, "no active rule satisfied for role");
    }

    #[tokio::test]
    async fn snapshot_failure_fails_open() {
        let db = create_database().await;

        let link_id = seed_link(&db, 1, 2).await;
        seed_token_rule(&db, 1, 10, "5", true).await;

        let chat = Arc::new(MockChat::with_roles(1, 2, &[10]));
        let worker = build_worker(
            db.clone(),
            chat.clone(),
            MockHoldings { snapshot: None },
            Some(HashMap::new()),
        );

        worker.check_member(1, 2).await.unwrap();

        // The held role survives the outage and nothing is audited.
        assert!(chat.removed.lock().unwrap().is_empty());
        assert_eq!(audit_count(&db).await, 0);

        // The checkpoint still advances.
        let link = wallet_link::Entity::find_by_id(link_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();

        assert!(link.last_checked_at.is_some());
    }

    #[tokio::test]
    async fn price_outage_leaves_usd_rules_indeterminate() {
        let db = create_database().await;

        seed_link(&db, 1, 2).await;
        seed_usd_rule(&db, 1, 10).await;

        let chat = Arc::new(MockChat::with_roles(1, 2, &[10]));
        let worker = build_worker(
            db.clone(),
            chat.clone(),
            MockHoldings {
                snapshot: Some(WalletSnapshot::default()),
            },
            None,
        );

        worker.check_member(1, 2).await.unwrap();

        assert!(chat.added.lock().unwrap().is_empty());
        assert!(chat.removed.lock().unwrap().is_empty());
        assert_eq!(audit_count(&db).await, 0);
    }

    #[tokio::test]
    async fn unmanageable_roles_are_skipped() {
        let db = create_database().await;

        seed_link(&db, 1, 2).await;
        seed_token_rule(&db, 1, 10, "0", true).await;

        let chat = Arc::new(MockChat {
            unmanageable: HashSet::from([10]),
            ..Default::default()
        });
        let worker = build_worker(
            db.clone(),
            chat.clone(),
            MockHoldings {
                snapshot: Some(WalletSnapshot::default()),
            },
            Some(HashMap::new()),
        );

        worker.check_member(1, 2).await.unwrap();

        assert!(chat.added.lock().unwrap().is_empty());
        assert_eq!(audit_count(&db).await, 0);
    }

    #[tokio::test]
    async fn missing_member_is_skipped_silently() {
        let db = create_database().await;

        let link_id = seed_link(&db, 1, 2).await;
        seed_token_rule(&db, 1, 10, "0", true).await;

        let chat = Arc::new(MockChat {
            missing_members: HashSet::from([(1, 2)]),
            ..Default::default()
        });
        let worker = build_worker(
            db.clone(),
            chat.clone(),
            MockHoldings {
                snapshot: Some(WalletSnapshot::default()),
            },
            Some(HashMap::new()),
        );

        worker.check_member(1, 2).await.unwrap();

        assert!(chat.added.lock().unwrap().is_empty());

        let link = wallet_link::Entity::find_by_id(link_id)
            .one(&db)
            .await
            .unwrap()
            .unwrap();

        assert!(link.last_checked_at.is_none());
    }

    #[tokio::test]
    async fn unlink_sweep_removes_held_managed_roles() {
        let db = create_database().await;

        seed_link(&db, 1, 2).await;
        seed_token_rule(&db, 1, 10, "0", true).await;
        // Disabled rules still mark their role as managed.
        seed_token_rule(&db, 1, 11, "0", false).await;

        let chat = Arc::new(MockChat::with_roles(1, 2, &[10, 999]));
        let worker = build_worker(
            db.clone(),
            chat.clone(),
            MockHoldings {
                snapshot: Some(WalletSnapshot::default()),
            },
            Some(HashMap::new()),
        );

        worker.remove_managed_roles_for_member(1, 2).await.unwrap();

        assert_eq!(*chat.removed.lock().unwrap(), vec![10]);

        let entries = audit_entry::Entity::find().all(&db).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].reason, "wallet unlinked");

        // The unmanaged role the member also held stays untouched.
        assert!(chat
            .held
            .lock()
            .unwrap()
            .get(&(1, 2))
            .unwrap()
            .contains(&999));
    }

    #[tokio::test]
    async fn cleanup_prunes_spent_sessions_and_old_audit_entries() {
        let db = create_database().await;

        seed_link(&db, 1, 2).await;

        // One live session, one expired.
        db::verify_session::Entity::insert(db::verify_session::generate(
            1,
            2,
            db::Duration::minutes(10),
        ))
        .exec_without_returning(&db)
        .await
        .unwrap();

        db::verify_session::Entity::insert(db::verify_session::generate(
            1,
            3,
            db::Duration::minutes(-1),
        ))
        .exec_without_returning(&db)
        .await
        .unwrap();

        // One recent audit entry, one past retention.
        audit_entry::Entity::insert(audit_entry::record(
            1,
            2,
            None,
            Some(10),
            audit_entry::Action::RoleAdded,
            "recent",
        ))
        .exec_without_returning(&db)
        .await
        .unwrap();

        let mut old = audit_entry::record(1, 2, None, Some(10), audit_entry::Action::RoleAdded, "old");
        old.created_at = ActiveValue::Set(db::now() - db::Duration::days(120));
        audit_entry::Entity::insert(old)
            .exec_without_returning(&db)
            .await
            .unwrap();

        let chat = Arc::new(MockChat::default());
        let worker = build_worker(
            db.clone(),
            chat,
            MockHoldings { snapshot: None },
            Some(HashMap::new()),
        );

        worker.run_cleanup().await.unwrap();

        assert_eq!(
            db::verify_session::Entity::find().count(&db).await.unwrap(),
            1
        );
        assert_eq!(audit_count(&db).await, 1);
    }
}
