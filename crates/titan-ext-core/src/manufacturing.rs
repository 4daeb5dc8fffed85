//! # Manufacturing
//!
//! Bills of materials, single-level cost rollup, cycle detection and the
//! manufacturing order state machine.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   ┌───────┐  plan   ┌─────────┐  start   ┌─────────────┐  complete      │
//! │   │ draft │───────►│ planned │────────►│ in_progress │──────────┐     │
//! │   └───┬───┘        └────┬────┘         └──────┬──────┘          ▼     │
//! │       │   start         │                     │           ┌───────────┐│
//! │       └─────────────────┼────────────────────►│           │ completed ││
//! │       │                 │                     │           └───────────┘│
//! │       │ cancel          │ cancel                                       │
//! │       ▼                 ▼                                              │
//! │   ┌───────────────────────────┐                                        │
//! │   │         cancelled         │   (no cancel once components consumed) │
//! │   └───────────────────────────┘                                        │
//! │                                                                         │
//! │  start:    components consumed (stock − item.qty × order.qty)          │
//! │  complete: output produced (stock + order.qty) at BOM unit cost        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::validation::{
    checked_amount, validate_name, validate_note, validate_quantity, validate_uuid,
};

// =============================================================================
// Bill of Materials
// =============================================================================

/// A recipe producing one unit of `product_id`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Bom {
    pub id: String,
    pub product_id: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// One component line of a BOM.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BomItem {
    pub id: String,
    pub bom_id: String,
    pub component_product_id: String,
    /// Units of the component per unit of output.
    pub quantity: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A BOM line joined with its component product.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BomItemDetail {
    pub id: String,
    pub component_product_id: String,
    pub component_sku: String,
    pub component_name: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub current_stock: i64,
}

/// Cost of one BOM line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BomCostLine {
    pub component_product_id: String,
    pub component_sku: String,
    pub quantity: i64,
    pub unit_cost_cents: i64,
    pub line_cost_cents: i64,
}

/// Rolled-up cost of one unit of a BOM's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BomCost {
    pub bom_id: String,
    pub lines: Vec<BomCostLine>,
    pub total_cents: i64,
}

impl BomCost {
    /// Single-level rollup: `Σ item.quantity × component unit cost`.
    ///
    /// ```rust
    /// use titan_ext_core::manufacturing::{BomCost, BomItemDetail};
    ///
    /// let items = vec![BomItemDetail {
    ///     id: "i1".into(),
    ///     component_product_id: "flour".into(),
    ///     component_sku: "FLOUR".into(),
    ///     component_name: "Flour".into(),
    ///     quantity: 2,
    ///     unit_cost_cents: 150,
    ///     current_stock: 10,
    /// }];
    /// let cost = BomCost::rollup("bom-1", &items).unwrap();
    /// assert_eq!(cost.total_cents, 300);
    /// ```
    ///
    /// ## Errors
    /// * `Validation(OutOfRange)` - a line cost or the total overflows
    pub fn rollup(bom_id: &str, items: &[BomItemDetail]) -> CoreResult<BomCost> {
        let mut lines = Vec::with_capacity(items.len());
        let mut total = Money::zero();

        for item in items {
            let line_cost = checked_amount(
                "line_cost_cents",
                Money::from_cents(item.unit_cost_cents).checked_multiply_quantity(item.quantity),
            )?;
            total = checked_amount("total_cents", total.checked_add(line_cost))?;

            lines.push(BomCostLine {
                component_product_id: item.component_product_id.clone(),
                component_sku: item.component_sku.clone(),
                quantity: item.quantity,
                unit_cost_cents: item.unit_cost_cents,
                line_cost_cents: line_cost.cents(),
            });
        }

        Ok(BomCost {
            bom_id: bom_id.to_string(),
            lines,
            total_cents: total.cents(),
        })
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// A BOM with its component lines and rolled-up cost.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BomDetail {
    #[serde(flatten)]
    pub bom: Bom,
    pub items: Vec<BomItemDetail>,
    pub cost: BomCost,
}

/// A component line for a new BOM or for `add_item`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewBomItem {
    pub component_product_id: String,
    pub quantity: i64,
}

impl NewBomItem {
    pub fn validate(&self) -> CoreResult<()> {
        validate_uuid("component_product_id", &self.component_product_id)?;
        validate_quantity("quantity", self.quantity)?;
        Ok(())
    }
}

/// Fields for a new BOM.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewBom {
    pub product_id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub items: Vec<NewBomItem>,
}

impl NewBom {
    pub fn validate(&self) -> CoreResult<()> {
        validate_uuid("product_id", &self.product_id)?;
        validate_name("name", &self.name)?;
        validate_note(self.description.as_deref())?;
        for item in &self.items {
            item.validate()?;
        }
        Ok(())
    }
}

/// Partial update of a BOM header.
///
/// An empty (or blank) `description` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BomPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

impl BomPatch {
    pub fn validate(&self) -> CoreResult<()> {
        if let Some(name) = &self.name {
            validate_name("name", name)?;
        }
        validate_note(self.description.as_deref())?;
        Ok(())
    }

    /// The new description: `None` leaves it, `Some(None)` clears it.
    ///
    /// ```rust
    /// use titan_ext_core::manufacturing::BomPatch;
    ///
    /// let clear = BomPatch { description: Some("  ".into()), ..Default::default() };
    /// assert_eq!(clear.description_change(), Some(None));
    /// assert_eq!(BomPatch::default().description_change(), None);
    /// ```
    pub fn description_change(&self) -> Option<Option<String>> {
        self.description.as_ref().map(|description| {
            if description.trim().is_empty() {
                None
            } else {
                Some(description.clone())
            }
        })
    }
}

// =============================================================================
// Cycle Detection
// =============================================================================

/// Product dependency graph built from every BOM (active or not).
///
/// An edge `output → component` means producing `output` needs `component`.
#[derive(Debug, Clone, Default)]
pub struct BomGraph {
    edges: HashMap<String, Vec<String>>,
}

impl BomGraph {
    /// Builds the graph from `(output_product_id, component_product_id)` pairs.
    pub fn from_edges<I, S>(edges: I) -> Self
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let mut graph = BomGraph::default();
        for (output, component) in edges {
            graph.add_edge(output, component);
        }
        graph
    }

    pub fn add_edge(&mut self, output: impl Into<String>, component: impl Into<String>) {
        self.edges
            .entry(output.into())
            .or_default()
            .push(component.into());
    }

    /// True if `from` needs `target`, directly or through sub-assemblies.
    ///
    /// Depth-first with a visited set, so pre-existing cycles terminate.
    pub fn depends_on(&self, from: &str, target: &str) -> bool {
        let mut stack = vec![from];
        let mut visited: HashSet<&str> = HashSet::new();

        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if !visited.insert(node) {
                continue;
            }
            if let Some(children) = self.edges.get(node) {
                stack.extend(children.iter().map(String::as_str));
            }
        }
        false
    }

    /// Whether `component` may be added to a BOM producing `product`.
    ///
    /// False exactly when the component is the product itself or already
    /// depends on it.
    ///
    /// ```rust
    /// use titan_ext_core::manufacturing::BomGraph;
    ///
    /// // bread needs dough, dough needs flour
    /// let graph = BomGraph::from_edges([("bread", "dough"), ("dough", "flour")]);
    /// assert!(graph.check_circular_dependency("bread", "flour"));
    /// assert!(!graph.check_circular_dependency("flour", "bread"));
    /// assert!(!graph.check_circular_dependency("bread", "bread"));
    /// ```
    pub fn check_circular_dependency(&self, product: &str, component: &str) -> bool {
        !self.would_create_cycle(product, component)
    }

    /// Negation of [`BomGraph::check_circular_dependency`].
    pub fn would_create_cycle(&self, product: &str, component: &str) -> bool {
        product == component || self.depends_on(component, product)
    }

    /// Errors with `CircularDependency` if the edge would close a cycle.
    pub fn ensure_acyclic(&self, product: &str, component: &str) -> CoreResult<()> {
        if self.would_create_cycle(product, component) {
            return Err(CoreError::CircularDependency {
                product_id: product.to_string(),
                component_product_id: component.to_string(),
            });
        }
        Ok(())
    }
}

// =============================================================================
// Manufacturing Orders
// =============================================================================

/// Status of a manufacturing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Draft,
    Planned,
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Draft => "draft",
            OrderStatus::Planned => "planned",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Whether the state machine has an edge `self → to`.
    pub fn can_transition_to(&self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Draft, Planned)
                | (Draft, InProgress)
                | (Planned, InProgress)
                | (InProgress, Completed)
                | (Draft, Cancelled)
                | (Planned, Cancelled)
        )
    }

    /// Checks a transition for `order_id`.
    ///
    /// Anything leaving `Completed` fails with `OrderAlreadyCompleted`,
    /// other illegal edges with `InvalidOrderTransition`.
    pub fn transition(self, order_id: &str, to: OrderStatus) -> CoreResult<OrderStatus> {
        if self == OrderStatus::Completed {
            return Err(CoreError::OrderAlreadyCompleted(order_id.to_string()));
        }
        if !self.can_transition_to(to) {
            return Err(CoreError::InvalidOrderTransition {
                order_id: order_id.to_string(),
                from: self.to_string(),
                to: to.to_string(),
            });
        }
        Ok(to)
    }

    /// Orders may be deleted only before they touch stock, or once cancelled.
    pub fn is_deletable(&self) -> bool {
        matches!(self, OrderStatus::Draft | OrderStatus::Cancelled)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A production run of `quantity` units from one BOM.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ManufacturingOrder {
    pub id: String,
    /// Human-readable code, `MO-YYYYMMDD-NNNN`.
    pub code: String,
    pub bom_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub status: OrderStatus,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub started_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub completed_at: Option<DateTime<Utc>>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// Fields for a new manufacturing order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct NewManufacturingOrder {
    pub bom_id: String,
    pub quantity: i64,
    pub notes: Option<String>,
}

impl NewManufacturingOrder {
    pub fn validate(&self) -> CoreResult<()> {
        validate_uuid("bom_id", &self.bom_id)?;
        validate_quantity("quantity", self.quantity)?;
        validate_note(self.notes.as_deref())?;
        Ok(())
    }
}

/// Builds an order code from the creation date and the day's sequence.
///
/// ```rust
/// use chrono::NaiveDate;
/// use titan_ext_core::manufacturing::order_code;
///
/// let day = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
/// assert_eq!(order_code(day, 7), "MO-20260301-0007");
/// ```
pub fn order_code(date: NaiveDate, sequence: u32) -> String {
    format!("MO-{}-{:04}", date.format("%Y%m%d"), sequence)
}

/// Prefix shared by every order code created on `date`.
pub fn order_code_prefix(date: NaiveDate) -> String {
    format!("MO-{}-", date.format("%Y%m%d"))
}

// =============================================================================
// Stock Movements
// =============================================================================

/// Kind of manufacturing stock movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum StockMovementKind {
    Consume,
    Produce,
}

/// Stock change caused by a manufacturing order.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct ManufacturingStockMovement {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub kind: StockMovementKind,
    /// Negative for consumption, positive for production.
    pub quantity: i64,
    pub unit_cost_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Component needs of an order against current stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ComponentRequirement {
    pub component_product_id: String,
    pub component_sku: String,
    pub component_name: String,
    pub required: i64,
    pub available: i64,
    pub shortage: i64,
}

impl ComponentRequirement {
    pub fn is_satisfied(&self) -> bool {
        self.shortage == 0
    }
}

/// Per-component requirements for producing `order_quantity` units.
pub fn requirements(items: &[BomItemDetail], order_quantity: i64) -> Vec<ComponentRequirement> {
    items
        .iter()
        .map(|item| {
            let required = item.quantity.saturating_mul(order_quantity);
            ComponentRequirement {
                component_product_id: item.component_product_id.clone(),
                component_sku: item.component_sku.clone(),
                component_name: item.component_name.clone(),
                required,
                available: item.current_stock,
                shortage: (required - item.current_stock).max(0),
            }
        })
        .collect()
}

/// Fails with `InsufficientStock` for the first component that falls short.
pub fn ensure_components_available(requirements: &[ComponentRequirement]) -> CoreResult<()> {
    match requirements.iter().find(|r| !r.is_satisfied()) {
        Some(short) => Err(CoreError::InsufficientStock {
            sku: short.component_sku.clone(),
            available: short.available,
            requested: short.required,
        }),
        None => Ok(()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn item(product: &str, qty: i64, cost: i64, stock: i64) -> BomItemDetail {
        BomItemDetail {
            id: crate::new_id(),
            component_product_id: product.to_string(),
            component_sku: product.to_uppercase(),
            component_name: product.to_string(),
            quantity: qty,
            unit_cost_cents: cost,
            current_stock: stock,
        }
    }

    #[test]
    fn test_bom_cost_rollup() {
        let items = vec![item("flour", 2, 150, 0), item("yeast", 1, 45, 0)];
        let cost = BomCost::rollup("bom", &items).unwrap();

        assert_eq!(cost.lines.len(), 2);
        assert_eq!(cost.lines[0].line_cost_cents, 300);
        assert_eq!(cost.total_cents, 345);
        assert_eq!(cost.total().cents(), 345);
    }

    #[test]
    fn test_empty_bom_costs_nothing() {
        assert_eq!(BomCost::rollup("bom", &[]).unwrap().total_cents, 0);
    }

    #[test]
    fn test_bom_cost_overflow_is_an_error() {
        let items = vec![item("gold", 3, i64::MAX / 2, 0)];
        assert!(matches!(
            BomCost::rollup("bom", &items),
            Err(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));

        let items = vec![item("a", 1, i64::MAX / 2, 0), item("b", 1, i64::MAX / 2 + 2, 0)];
        assert!(BomCost::rollup("bom", &items).is_err());
    }

    #[test]
    fn test_cycle_detection() {
        let graph = BomGraph::from_edges([("bread", "dough"), ("dough", "flour")]);

        assert!(graph.would_create_cycle("flour", "bread"));
        assert!(graph.would_create_cycle("dough", "bread"));
        assert!(graph.would_create_cycle("bread", "bread"));
        assert!(!graph.would_create_cycle("bread", "salt"));
        assert!(graph.check_circular_dependency("sandwich", "bread"));

        let err = graph.ensure_acyclic("flour", "bread").unwrap_err();
        assert!(matches!(err, CoreError::CircularDependency { .. }));
    }

    #[test]
    fn test_cycle_detection_terminates_on_existing_cycle() {
        let graph = BomGraph::from_edges([("a", "b"), ("b", "a")]);
        assert!(!graph.depends_on("a", "c"));
    }

    #[test]
    fn test_order_transitions() {
        let s = OrderStatus::Draft.transition("mo", OrderStatus::Planned).unwrap();
        let s = s.transition("mo", OrderStatus::InProgress).unwrap();
        let s = s.transition("mo", OrderStatus::Completed).unwrap();
        assert_eq!(s, OrderStatus::Completed);

        assert!(OrderStatus::Draft
            .transition("mo", OrderStatus::InProgress)
            .is_ok());
        assert!(matches!(
            OrderStatus::Draft.transition("mo", OrderStatus::Completed),
            Err(CoreError::InvalidOrderTransition { .. })
        ));
        assert!(matches!(
            OrderStatus::Cancelled.transition("mo", OrderStatus::Planned),
            Err(CoreError::InvalidOrderTransition { .. })
        ));
        // Components are already consumed once production started
        assert!(matches!(
            OrderStatus::InProgress.transition("mo", OrderStatus::Cancelled),
            Err(CoreError::InvalidOrderTransition { .. })
        ));
    }

    #[test]
    fn test_completed_order_is_final() {
        for to in [
            OrderStatus::Planned,
            OrderStatus::InProgress,
            OrderStatus::Cancelled,
        ] {
            assert!(matches!(
                OrderStatus::Completed.transition("mo", to),
                Err(CoreError::OrderAlreadyCompleted(_))
            ));
        }
    }

    #[test]
    fn test_deletable() {
        assert!(OrderStatus::Draft.is_deletable());
        assert!(OrderStatus::Cancelled.is_deletable());
        assert!(!OrderStatus::InProgress.is_deletable());
        assert!(!OrderStatus::Completed.is_deletable());
    }

    #[test]
    fn test_requirements_and_shortage() {
        let items = vec![item("flour", 2, 150, 12), item("yeast", 1, 45, 50)];
        let reqs = requirements(&items, 10);

        assert_eq!(reqs[0].required, 20);
        assert_eq!(reqs[0].shortage, 8);
        assert!(reqs[1].is_satisfied());

        let err = ensure_components_available(&reqs).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Insufficient stock for FLOUR: available 12, requested 20"
        );
    }

    #[test]
    fn test_order_code() {
        let day = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
        assert_eq!(order_code(day, 42), "MO-20261231-0042");
        assert_eq!(order_code_prefix(day), "MO-20261231-");
    }

    #[test]
    fn test_new_bom_validation() {
        let bom = NewBom {
            product_id: crate::new_id(),
            name: "Bread".to_string(),
            description: None,
            items: vec![NewBomItem {
                component_product_id: crate::new_id(),
                quantity: 0,
            }],
        };
        assert!(bom.validate().is_err());
    }

    #[test]
    fn test_status_serde() {
        let json = serde_json::to_string(&OrderStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
    }
}
