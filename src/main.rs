// ==========================================
// LoRaWAN 设备管理 - 命令行入口
// ==========================================
// 用途: 导入文件试运行（仅解析 + 校验，不调用注册中心）
//
// 用法:
//   lorawan-admin <file> <profile_id> [db_path]
//
// 输出: 每行校验结论（JSON）
// ==========================================

use anyhow::{bail, Context, Result};
use lorawan_admin::config::{ConfigManager, ImportSettings};
use lorawan_admin::db::default_db_path;
use lorawan_admin::domain::{RegistrySnapshot, Upload};
use lorawan_admin::importer::{DeviceImporter, DeviceImporterImpl};
use lorawan_admin::logging;
use lorawan_admin::registry::{InMemoryRegistry, RegistryClient};
use lorawan_admin::repository::ImportProfileRepository;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let (Some(file), Some(profile_id)) = (args.next(), args.next()) else {
        eprintln!("用法: lorawan-admin <file> <profile_id> [db_path]");
        bail!("缺少参数");
    };
    let db_path = args.next().unwrap_or_else(default_db_path);

    tracing::info!("==================================================");
    tracing::info!("LoRaWAN 设备管理 - 导入试运行");
    tracing::info!("系统版本: {}", lorawan_admin::VERSION);
    tracing::info!("使用数据库: {}", db_path);
    tracing::info!("==================================================");

    let config = ConfigManager::new(&db_path)
        .map_err(|e| anyhow::anyhow!(e))
        .context("无法打开配置数据库")?;
    let settings = ImportSettings::load(&config)
        .await
        .map_err(|e| anyhow::anyhow!(e))
        .context("导入配置加载失败")?;
    let profiles = ImportProfileRepository::new(&db_path).context("无法打开规则集仓储")?;

    // 试运行不访问真实注册中心
    let registry: Arc<dyn RegistryClient> = Arc::new(InMemoryRegistry::new());
    let importer = DeviceImporterImpl::new(profiles, registry, settings);
    tracing::debug!(
        max_upload_bytes = importer.settings().max_upload_bytes,
        ragged_row_policy = %importer.settings().ragged_row_policy,
        tag_column_prefix = %importer.settings().tag_column_prefix,
        "导入配置已加载"
    );

    let bytes = std::fs::read(&file).with_context(|| format!("无法读取文件: {}", file))?;
    let upload = Upload::new(bytes).with_file_name(file.clone());

    let verdicts = importer
        .validate_upload(&upload, &profile_id, &RegistrySnapshot::empty())
        .await?;

    let invalid = verdicts.iter().filter(|v| !v.valid).count();
    tracing::info!(total = verdicts.len(), invalid, "试运行完成");

    println!("{}", serde_json::to_string_pretty(&verdicts)?);
    Ok(())
}
