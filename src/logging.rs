// ==========================================
// 日志系统初始化
// ==========================================
// 使用 tracing 和 tracing-subscriber
// 支持环境变量配置日志级别与输出格式
// 日志写入 stderr，stdout 留给命令行 JSON 输出
// ==========================================

use tracing_subscriber::{fmt, EnvFilter};

/// 日志格式环境变量（取值: text / json）
pub const LOG_FORMAT_ENV: &str = "LORAWAN_ADMIN_LOG_FORMAT";

fn env_filter() -> EnvFilter {
    // 从环境变量读取日志级别，默认为 info
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 按环境变量选择日志格式并初始化
///
/// # 环境变量
/// - RUST_LOG: 日志级别过滤器（默认: info）
///   例如: RUST_LOG=debug 或 RUST_LOG=lorawan_admin=trace
/// - LORAWAN_ADMIN_LOG_FORMAT: json 时输出结构化日志
///
/// # 示例
/// ```no_run
/// use lorawan_admin::logging;
/// logging::init();
/// ```
pub fn init() {
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.trim().eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        init_json();
    } else {
        init_text();
    }
}

/// 文本格式
pub fn init_text() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// JSON 格式（便于日志采集）
pub fn init_json() {
    let _ = fmt()
        .json()
        .with_env_filter(env_filter())
        .with_current_span(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// 初始化测试环境的日志系统
///
/// 使用更详细的日志级别，便于调试
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
