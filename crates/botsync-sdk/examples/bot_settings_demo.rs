//! Bot 设置同步演示
//!
//! 模拟界面上的滑块拖动、改回原值和切换 Bot，观察哪些写入真正到达后端。

use std::sync::Arc;
use std::time::Duration;

use botsync_sdk::{
    ActiveBotStore, Bot, BotSettingsSync, ChannelCommitSink, FieldName, RetryingCommitSink,
    SyncConfig, SyncEvent,
};
use tokio::time::sleep;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 初始化日志
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("\n==============================================");
    println!("⚙️  Bot 设置同步演示");
    println!("==============================================\n");

    let config = SyncConfig::builder()
        .debounce_delay(Duration::from_millis(500))
        .build();
    let (channel_sink, mut updates) = ChannelCommitSink::new();
    let sink = RetryingCommitSink::new(channel_sink, config.retry.clone());
    let sync = BotSettingsSync::new(config, Arc::new(sink))?;

    // 模拟后端：打印收到的部分更新
    let backend = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            match update.to_json() {
                Ok(body) => println!("  📥 PATCH /bots/{} {}", update.bot_id, body),
                Err(e) => println!("  ❌ 无法序列化更新: {}", e),
            }
        }
    });

    let mut events = sync.subscribe_events();
    let event_log = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let SyncEvent::CommitSuppressed { field, .. } = &event {
                println!("  🚫 {} 未变化，跳过写入", field);
            }
        }
    });

    let store = Arc::new(ActiveBotStore::new());
    let bot_a = Bot::from_json(
        r#"{"_id": "bot-a", "name": "Writer", "maxTokens": 100, "customTemperature": 0.5}"#,
    )?;
    let bot_b = Bot::new("bot-b")
        .with_name("Coder")
        .with_field(FieldName::MaxTokens, 2048);
    store.select(Some(bot_a));
    sync.follow(store.clone());

    // 场景 1: 拖动滑块
    println!("场景 1: maxTokens 从 100 拖到 200");
    for value in (110..=200).step_by(10) {
        sync.set_local(FieldName::MaxTokens, value);
        sleep(Duration::from_millis(30)).await;
    }
    sleep(Duration::from_millis(700)).await;

    // 场景 2: 改动后又改回原值
    println!("\n场景 2: temperature 0.5 → 0.7 → 0.5");
    sync.set_local(FieldName::Temperature, 0.7);
    sleep(Duration::from_millis(100)).await;
    sync.set_local(FieldName::Temperature, 0.5);
    sleep(Duration::from_millis(700)).await;

    // 场景 3: 编辑后立即切换 Bot
    println!("\n场景 3: 编辑 systemPrompt 后立即切换到 bot-b");
    sync.set_local(FieldName::SystemPrompt, "You are a poet.");
    store.select(Some(bot_b));
    sleep(Duration::from_millis(700)).await;
    println!(
        "  🪞 bot-b 的 maxTokens 镜像: {}",
        sync.mirror_value(FieldName::MaxTokens)
    );

    let stats = sync.stats();
    println!("\n📊 统计: {:?}", stats);

    sync.shutdown();
    drop(sync);
    backend.abort();
    event_log.abort();

    println!("\n==============================================");
    println!("✅ 演示完成");
    println!("==============================================\n");
    Ok(())
}
