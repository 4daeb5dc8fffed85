//! # Host Events
//!
//! Payloads the host POS sends when something happens on its side, and the
//! fragments the modules hand back.
//!
//! ## Event Routing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  host event            interested modules       result                  │
//! │  ──────────            ──────────────────       ──────                  │
//! │  product_saved         containers               link set / removed      │
//! │  order_created         containers               `out` movements         │
//! │  footer_render         every enabled module     script fragments        │
//! │  options_assembly      every module             option sections         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//! ```json
//! { "event": "order_created",
//!   "payload": { "order_id": "...", "customer_id": "...",
//!                "lines": [{ "product_id": "...", "quantity": 2 }] } }
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::containers::ContainerMovement;

/// The extension modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ExtModule {
    Containers,
    Manufacturing,
    Loyalty,
}

impl ExtModule {
    pub const ALL: [ExtModule; 3] = [
        ExtModule::Containers,
        ExtModule::Manufacturing,
        ExtModule::Loyalty,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExtModule::Containers => "containers",
            ExtModule::Manufacturing => "manufacturing",
            ExtModule::Loyalty => "loyalty",
        }
    }

    /// Front-end asset injected into the host footer.
    pub fn script_path(&self) -> String {
        format!("/modules/{}/module.js", self.as_str())
    }

    /// Permission a bearer token needs for the module's routes.
    pub fn permission(&self) -> &'static str {
        match self {
            ExtModule::Containers => "containers.manage",
            ExtModule::Manufacturing => "manufacturing.manage",
            ExtModule::Loyalty => "loyalty.manage",
        }
    }
}

impl fmt::Display for ExtModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Events
// =============================================================================

/// A product was created or updated in the host.
///
/// `container_type_id: None` removes any container link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProductSavedPayload {
    pub product_id: String,
    pub container_type_id: Option<String>,
    /// Containers per unit; defaults to 1 when a type is given.
    pub container_quantity: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderLine {
    pub product_id: String,
    pub quantity: i64,
}

/// An order was placed in the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderCreatedPayload {
    pub order_id: String,
    pub customer_id: Option<String>,
    pub lines: Vec<OrderLine>,
}

/// An event raised by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "event", content = "payload", rename_all = "snake_case")]
pub enum HostEvent {
    ProductSaved(ProductSavedPayload),
    OrderCreated(OrderCreatedPayload),
    FooterRender,
    OptionsAssembly,
}

impl HostEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HostEvent::ProductSaved(_) => "product_saved",
            HostEvent::OrderCreated(_) => "order_created",
            HostEvent::FooterRender => "footer_render",
            HostEvent::OptionsAssembly => "options_assembly",
        }
    }
}

// =============================================================================
// Outputs
// =============================================================================

/// Script tag a module asks the host to render in its footer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct FooterFragment {
    pub module: ExtModule,
    pub script: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OptionField {
    pub key: String,
    pub label: String,
    pub value: String,
}

/// A block of settings on the host options page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OptionSection {
    pub module: ExtModule,
    pub label: String,
    pub fields: Vec<OptionField>,
}

/// A module that failed while handling an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HookFailure {
    pub module: ExtModule,
    pub message: String,
}

/// What the modules did with one event.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct HookOutcome {
    pub event: String,
    pub movements: Vec<ContainerMovement>,
    pub fragments: Vec<FooterFragment>,
    pub sections: Vec<OptionSection>,
    pub failures: Vec<HookFailure>,
}

impl HookOutcome {
    pub fn for_event(event: &HostEvent) -> Self {
        HookOutcome {
            event: event.name().to_string(),
            ..Default::default()
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Footer fragments for the enabled modules, in module order.
pub fn footer_fragments<F>(is_enabled: F) -> Vec<FooterFragment>
where
    F: Fn(ExtModule) -> bool,
{
    ExtModule::ALL
        .into_iter()
        .filter(|m| is_enabled(*m))
        .map(|module| FooterFragment {
            module,
            script: module.script_path(),
        })
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
