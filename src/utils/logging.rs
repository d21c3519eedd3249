/// 日志工具模块
///
/// 提供日志初始化和格式化输出的辅助函数
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::services::provider_registry::ProviderConfig;

/// 初始化日志
///
/// 优先使用 `RUST_LOG`，否则根据 `verbose` 选择 debug / info。
/// 重复调用是安全的（测试中会多次调用）
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// 记录程序启动信息
pub fn log_startup(config: &Config, providers: &[ProviderConfig]) {
    info!("{}", "=".repeat(60));
    info!(
        "🚀 学习助手生成服务启动 - {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    let names: Vec<&str> = providers.iter().map(|p| p.name.name()).collect();
    info!("🔌 可用 provider: [{}]", names.join(" → "));
    info!(
        "📦 出题策略: {:?}, 每批 {} 道, 超量比例 {}",
        config.batch_strategy, config.batch_size, config.over_fetch_ratio
    );
    info!("{}", "=".repeat(60));
}

/// 记录批次计划
pub fn log_batch_plan(target: usize, over_fetch: usize, batch_sizes: &[usize]) {
    info!(
        "📋 目标 {} 道，超量请求 {} 道，分为 {} 个子批次 {:?}",
        target,
        over_fetch,
        batch_sizes.len(),
        batch_sizes
    );
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大字符数
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
