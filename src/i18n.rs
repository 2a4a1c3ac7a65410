// ==========================================
// 国际化 (i18n) - 行校验信息
// ==========================================
// 文案: locales/zh-CN.yml（回退语言）、locales/en.yml
// 占位符: %{name}
// 注意: rust_i18n::i18n! 宏已在 lib.rs 中初始化
// ==========================================

/// 按 key 取当前语言文案，并替换 %{name} 占位符
///
/// # 示例
/// ```no_run
/// use lorawan_admin::i18n::t_with_args;
/// let msg = t_with_args("validation.missing_field", &[("field", "devEui")]);
/// ```
pub fn t_with_args(key: &str, args: &[(&str, &str)]) -> String {
    args.iter()
        .fold(rust_i18n::t!(key).to_string(), |text, (name, value)| {
            text.replace(&format!("%{{{}}}", name), value)
        })
}
