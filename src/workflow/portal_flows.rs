//! 门户流程定义
//!
//! 登录与单条路线上传两个流程，全部以声明式步骤描述

use std::path::Path;

use crate::config::{Config, PlateField};
use crate::models::{Credentials, RouteRecord};
use crate::workflow::flow::{Flow, Step};

pub const LOGIN_FLOW: &str = "portal login";

// ========== 登录页选择器 ==========

const LOGIN_USER: &str = "#usuario";
const LOGIN_PASS: &str = "#password";
const LOGIN_SUBMIT: &str = "[data-testid='SignInButton'], button[type='submit']";
const LOGIN_OK: &str = "#root > div > section > header > section > section \
     > article.customer-header__my-business > section > button > img";

/// 门户所有错误提示都以 MUI 对话框呈现
const PORTAL_ERROR_DIALOG: &str = "div.MuiDialog-root div.MuiDialogContent-root";

// ========== 批量上传与购物车选择器 ==========

const TEMPLATE_COMBO: &str = "div[role='button'][aria-haspopup='listbox']";
const TEMPLATE_STANDARD: &str = "ul[role='listbox'] li[role='option'][data-value='estandar']";
const TEMPLATE_SECOND: &str = "ul[role='listbox'] li[role='option']:nth-child(2)";
const FILE_INPUT: &str = "#file";
const SAVE_BUTTON: &str = "button[type='submit'][data-testid='LoadingButton']";
const CONTINUE_BUTTON: &str = "button[data-testid='NextActionButton']";
const CHANNEL_INPUT: &str = "#purchaseOrderNN13CANALT";
const OBSERVATIONS_INPUT: &str = "#formValue";
const PURCHASE_ORDER_INPUT: &str = "#purchaseOrderNN13ORDCOM";
const CART_CONFIRM: &str = "#root > div > section > article > section > section \
     > section.cart__resume-options > button:nth-child(3)";
const ORDER_ACCEPT: &str = "#root > div > section > article > section > section > section \
     > section.order__confirmation-products > article.order__confirmation-products-button > button";

// ========== 步骤名 ==========

pub const STEP_OPEN_PORTAL: &str = "open portal";
pub const STEP_FILL_USER: &str = "fill username";
pub const STEP_FILL_PASSWORD: &str = "fill password";
pub const STEP_SUBMIT_LOGIN: &str = "submit login";
pub const STEP_OPEN_UPLOAD: &str = "open bulk upload";
pub const STEP_OPEN_TEMPLATES: &str = "open template list";
pub const STEP_PICK_TEMPLATE: &str = "pick standard template";
pub const STEP_ATTACH_FILE: &str = "attach order file";
pub const STEP_SAVE_FILE: &str = "save order file";
pub const STEP_ADD_TO_CART: &str = "add products to cart";
pub const STEP_OPEN_CART: &str = "open cart summary";
pub const STEP_FILL_CHANNEL: &str = "fill purchase channel";
pub const STEP_FILL_PLATE: &str = "fill vehicle plate";
pub const STEP_CONFIRM_CART: &str = "confirm cart";

// 执行流程之外的阶段
pub const STAGE_PREPARING: &str = "preparing workload";
pub const STAGE_BROWSER: &str = "starting browser";
pub const STAGE_ARTIFACT: &str = "resolving upload file";

/// 登录流程
pub fn login_flow(config: &Config, credentials: &Credentials) -> Flow {
    let step = config.step_timeout();
    Flow::new(LOGIN_FLOW, LOGIN_OK, config.outcome_timeout())
        .with_error_probe(PORTAL_ERROR_DIALOG)
        .step(Step::navigate(
            STEP_OPEN_PORTAL,
            config.portal_base_url.as_str(),
            config.navigation_timeout(),
        ))
        .step(Step::fill(
            STEP_FILL_USER,
            LOGIN_USER,
            credentials.username.as_str(),
            step,
        ))
        .step(Step::fill(
            STEP_FILL_PASSWORD,
            LOGIN_PASS,
            credentials.secret.as_str(),
            step,
        ))
        .step(Step::click(STEP_SUBMIT_LOGIN, LOGIN_SUBMIT, step))
}

pub fn upload_flow_name(route: &str) -> String {
    format!("upload route {}", route)
}

/// 单条路线的上传流程：上传表格 → 加入购物车 → 填写渠道与车牌 → 确认
pub fn upload_flow(config: &Config, record: &RouteRecord, file: &Path) -> Flow {
    let step = config.step_timeout();
    let plate_input = match config.plate_field {
        PlateField::Observations => OBSERVATIONS_INPUT,
        PlateField::PurchaseOrder => PURCHASE_ORDER_INPUT,
    };

    Flow::new(
        upload_flow_name(&record.route),
        ORDER_ACCEPT,
        config.outcome_timeout(),
    )
    .with_error_probe(PORTAL_ERROR_DIALOG)
    .step(Step::navigate(
        STEP_OPEN_UPLOAD,
        config.portal_upload_url.as_str(),
        config.navigation_timeout(),
    ))
    .step(Step::click(STEP_OPEN_TEMPLATES, TEMPLATE_COMBO, step))
    .step(Step::click_with_fallback(
        STEP_PICK_TEMPLATE,
        TEMPLATE_STANDARD,
        TEMPLATE_SECOND,
        config.fallback_click_timeout(),
        step,
    ))
    .step(Step::upload(STEP_ATTACH_FILE, FILE_INPUT, file, step))
    .step(Step::click(STEP_SAVE_FILE, SAVE_BUTTON, step))
    .step(Step::click(STEP_ADD_TO_CART, CONTINUE_BUTTON, step))
    .step(Step::navigate(
        STEP_OPEN_CART,
        config.portal_cart_url.as_str(),
        config.navigation_timeout(),
    ))
    .step(Step::fill(
        STEP_FILL_CHANNEL,
        CHANNEL_INPUT,
        config.purchase_channel.as_str(),
        step,
    ))
    .step(Step::fill(
        STEP_FILL_PLATE,
        plate_input,
        record.plate.as_str(),
        step,
    ))
    .step(Step::click(STEP_CONFIRM_CART, CART_CONFIRM, step))
}

/// 步骤名转为可读描述，未知名称原样返回
pub fn describe_step(step: &str) -> String {
    let description = match step {
        STAGE_PREPARING => "准备订单数据",
        STAGE_BROWSER => "启动浏览器",
        STAGE_ARTIFACT => "查找上传文件",
        STEP_OPEN_PORTAL => "打开门户",
        STEP_FILL_USER => "填写用户名",
        STEP_FILL_PASSWORD => "填写密码",
        STEP_SUBMIT_LOGIN => "提交登录",
        STEP_OPEN_UPLOAD => "进入批量上传模块",
        STEP_OPEN_TEMPLATES => "打开模板列表",
        STEP_PICK_TEMPLATE => "选择标准模板",
        STEP_ATTACH_FILE => "上传订单文件",
        STEP_SAVE_FILE => "保存订单文件",
        STEP_ADD_TO_CART => "加入购物车",
        STEP_OPEN_CART => "打开购物车",
        STEP_FILL_CHANNEL => "填写采购渠道",
        STEP_FILL_PLATE => "填写车牌",
        STEP_CONFIRM_CART => "确认订单",
        other if other.ends_with(" outcome") => "等待门户确认",
        other => return other.to_string(),
    };
    description.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::flow::{StepAction, StepKind};

    fn record() -> RouteRecord {
        RouteRecord {
            route: "R1".into(),
            plate: "ABC123".into(),
            orders: Vec::new(),
        }
    }

    #[test]
    fn test_login_flow_uses_credentials() {
        let config = Config::default();
        let flow = login_flow(&config, &Credentials::new("ana", "s3cret"));
        assert_eq!(flow.name, LOGIN_FLOW);
        assert_eq!(flow.steps.len(), 4);
        assert_eq!(flow.steps[0].kind(), StepKind::Navigate);
        assert_eq!(
            flow.steps[2].action,
            StepAction::Fill {
                target: LOGIN_PASS.into(),
                value: "s3cret".into()
            }
        );
        assert!(flow.error_probe.is_some());
    }

    #[test]
    fn test_upload_flow_plate_field() {
        let mut config = Config::default();
        let flow = upload_flow(&config, &record(), Path::new("/tmp/R1.xlsx"));
        let plate = flow
            .steps
            .iter()
            .find(|s| s.name == STEP_FILL_PLATE)
            .unwrap();
        assert_eq!(plate.action.target(), OBSERVATIONS_INPUT);

        config.plate_field = PlateField::PurchaseOrder;
        let flow = upload_flow(&config, &record(), Path::new("/tmp/R1.xlsx"));
        let plate = flow
            .steps
            .iter()
            .find(|s| s.name == STEP_FILL_PLATE)
            .unwrap();
        assert_eq!(plate.action.target(), PURCHASE_ORDER_INPUT);
        assert_eq!(flow.name, "upload route R1");
    }

    #[test]
    fn test_upload_flow_template_has_fallback() {
        let config = Config::default();
        let flow = upload_flow(&config, &record(), Path::new("/tmp/R1.xlsx"));
        let pick = flow
            .steps
            .iter()
            .find(|s| s.name == STEP_PICK_TEMPLATE)
            .unwrap();
        assert!(matches!(
            &pick.action,
            StepAction::Click { fallback: Some(_), .. }
        ));
        assert_eq!(pick.fallback_window, Some(config.fallback_click_timeout()));
    }

    #[test]
    fn test_describe_step() {
        assert_eq!(describe_step(STEP_FILL_PLATE), "填写车牌");
        assert_eq!(describe_step(STAGE_ARTIFACT), "查找上传文件");
        assert_eq!(describe_step("upload route R1 outcome"), "等待门户确认");
        assert_eq!(describe_step("custom"), "custom");
    }
}
