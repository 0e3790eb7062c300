use anyhow::Result;
use futures_util::StreamExt;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tree_application::{
    command_handler::CommandHandler,
    config::AppConfig,
    context::AppContext,
    query_handler::QueryHandler,
    tree_queries::{CountTrees, FindTrees, GetTree, TreeQueryService},
    update_tree::{UpdateTree, UpdateTreeHandler, VerificationSettings},
};
use tree_domain::{
    entity::Entity,
    eventing::{EventBus, InMemoryEventBus},
    persist::{DomainEventRepository, InMemoryTreeStore, InMemoryTx, TreeRepository},
    tree::{TreeId, TreeRecord, TreeUpdate},
};

fn seed(store: &InMemoryTreeStore) -> Result<()> {
    store.nest_organization(20, 10)?;
    store.assign_planter(7, 20)?;

    store.insert_tree(TreeRecord::builder().id(TreeId::new(1)).planter_id(7).build())?;
    store.insert_tree(
        TreeRecord::builder()
            .id(TreeId::new(2))
            .approved(false)
            .planting_organization_id(10)
            .build(),
    )?;
    store.insert_tree(TreeRecord::builder().id(TreeId::new(3)).planter_id(8).build())?;
    store.tag_tree(TreeId::new(3), 5)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tree_domain=debug,tree_application=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_line_number(true),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        publishing = config.enable_verification_publishing,
        capacity = config.event_bus_capacity,
        "starting tree verification demo"
    );
    if config.database_url.is_some() {
        tracing::warn!("DATABASE_URL is set but the demo always runs on the in-memory store");
    }

    let store = Arc::new(InMemoryTreeStore::new());
    seed(&store)?;

    let bus = Arc::new(InMemoryEventBus::new(config.event_bus_capacity));
    let mut deliveries = bus.subscribe();
    let listener = tokio::spawn(async move {
        while let Some(delivered) = deliveries.next().await {
            match delivered {
                Ok(record) => println!("delivered: {}", record.payload()),
                Err(err) => tracing::warn!(error = %err, "subscriber lagged"),
            }
        }
    });

    let trees: Arc<dyn TreeRepository<InMemoryTx>> = store.clone();
    let events: Arc<dyn DomainEventRepository<InMemoryTx>> = store.clone();
    let event_bus: Arc<dyn EventBus> = bus.clone();
    let updates = UpdateTreeHandler::builder()
        .transactions(store.clone())
        .trees(trees)
        .events(events)
        .event_bus(event_bus)
        .settings(VerificationSettings::from(&config))
        .build();
    let queries = TreeQueryService::new(store.clone());

    let ctx = AppContext::builder()
        .correlation_id("demo-1")
        .actor_id("verifier")
        .build();

    // 驳回一条仍处于活跃状态的记录
    let rejected = updates
        .handle(
            &ctx,
            UpdateTree {
                id: TreeId::new(1),
                update: TreeUpdate::builder()
                    .approved(false)
                    .active(false)
                    .rejection_reason("pest")
                    .build(),
            },
        )
        .await?;
    println!("rejected: tree {} event {:?}", rejected.tree.id(), rejected.event);

    // 翻转核验结果
    let approved = updates
        .handle(
            &ctx,
            UpdateTree {
                id: TreeId::new(2),
                update: TreeUpdate::builder().approved(true).build(),
            },
        )
        .await?;
    println!("approved: tree {} event {:?}", approved.tree.id(), approved.event);

    let in_org = queries
        .handle(
            &ctx,
            FindTrees::from_where(&serde_json::json!({ "organizationId": 10 }))?,
        )
        .await?;
    println!("organization 10: {}", serde_json::to_string_pretty(&in_org)?);

    let untagged = queries
        .handle(
            &ctx,
            CountTrees {
                filter: FindTrees::from_where(&serde_json::json!({ "tagId": null }))?.filter,
            },
        )
        .await?;
    println!("untagged: {untagged}");

    let tree = queries.handle(&ctx, GetTree { id: TreeId::new(1) }).await?;
    println!("tree 1: {}", serde_json::to_string(&tree)?);

    drop(updates);
    drop(bus);
    listener.await?;
    Ok(())
}
