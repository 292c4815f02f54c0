//! JS 执行器 - 基础设施层
//!
//! 持有任务页面，只暴露"执行 JS"的能力

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::{json, Value as JsonValue};

use crate::error::SessionError;

/// 写值并触发 React 监听的事件。
/// 直接赋值不会被受控组件感知，需要走原生 setter 并同步 `_valueTracker`
const SET_AND_NOTIFY: &str = r#"
(sel, val) => {
    const el = document.querySelector(sel);
    if (!el) return false;
    el.focus();
    const proto = el instanceof HTMLTextAreaElement
        ? HTMLTextAreaElement.prototype
        : HTMLInputElement.prototype;
    const setter = Object.getOwnPropertyDescriptor(el, 'value')?.set
        || Object.getOwnPropertyDescriptor(proto, 'value').set;
    const previous = el.value;
    setter.call(el, val);
    if (el._valueTracker) el._valueTracker.setValue(previous);
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    el.blur();
    return true;
}
"#;

/// 按值或按位置选中 `<select>` 选项
const SELECT_OPTION: &str = r#"
(sel, choice) => {
    const el = document.querySelector(sel);
    if (!el || !el.options) return false;
    const options = Array.from(el.options).filter(o => !o.disabled);
    const opt = typeof choice === 'number'
        ? options[choice]
        : options.find(o => o.value === choice);
    if (!opt) return false;
    const setter = Object.getOwnPropertyDescriptor(HTMLSelectElement.prototype, 'value').set;
    setter.call(el, opt.value);
    el.dispatchEvent(new Event('input', { bubbles: true }));
    el.dispatchEvent(new Event('change', { bubbles: true }));
    return true;
}
"#;

/// 隐藏或禁用的文件输入框需要先恢复可交互
const UNHIDE_INPUT: &str = r#"
(sel) => {
    const input = document.querySelector(sel);
    if (!input) return false;
    input.removeAttribute('disabled');
    input.style.display = 'block';
    input.style.visibility = 'visible';
    input.style.opacity = 1;
    return true;
}
"#;

const PROBE: &str = "(sel) => document.querySelector(sel) !== null";

/// JS 执行器
///
/// 职责：
/// - 持有任务页面
/// - 暴露 eval() 能力以及几段固定脚本
/// - 不认识流程与步骤
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue, SessionError> {
        let result = self.page.evaluate(js_code.into()).await?;
        result
            .into_value()
            .map_err(|e| SessionError::Script(e.to_string()))
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, SessionError> {
        let json_value = self.eval(js_code).await?;
        serde_json::from_value(json_value).map_err(|e| SessionError::Script(e.to_string()))
    }

    /// 以 JSON 参数调用一段箭头函数脚本
    async fn call<T: DeserializeOwned>(
        &self,
        function: &str,
        args: &[JsonValue],
    ) -> Result<T, SessionError> {
        self.eval_as(render_call(function, args)).await
    }

    pub async fn set_and_notify(&self, selector: &str, value: &str) -> Result<bool, SessionError> {
        self.call(SET_AND_NOTIFY, &[json!(selector), json!(value)]).await
    }

    pub async fn select_by_value(&self, selector: &str, value: &str) -> Result<bool, SessionError> {
        self.call(SELECT_OPTION, &[json!(selector), json!(value)]).await
    }

    pub async fn select_by_ordinal(&self, selector: &str, index: usize) -> Result<bool, SessionError> {
        self.call(SELECT_OPTION, &[json!(selector), json!(index)]).await
    }

    pub async fn unhide_input(&self, selector: &str) -> Result<bool, SessionError> {
        self.call(UNHIDE_INPUT, &[json!(selector)]).await
    }

    pub async fn exists(&self, selector: &str) -> Result<bool, SessionError> {
        self.call(PROBE, &[json!(selector)]).await
    }
}

/// 生成 `(function)(arg1, arg2)` 形式的调用脚本，参数按 JSON 字面量传入
fn render_call(function: &str, args: &[JsonValue]) -> String {
    let rendered: Vec<String> = args.iter().map(JsonValue::to_string).collect();
    format!("({})({})", function.trim(), rendered.join(", "))
}
