//! Host event dispatcher.
//!
//! Routes each [`HostEvent`] to the modules that care about it. A module
//! that fails is logged and reported in [`HookOutcome::failures`]; it never
//! stops the other modules or fails the host's request.

use titan_ext_core::containers::ContainerMovement;
use titan_ext_core::hooks::{
    footer_fragments, ExtModule, HookFailure, HookOutcome, HostEvent, OrderCreatedPayload,
    ProductSavedPayload,
};
use titan_ext_core::settings::ModuleSettings;
use titan_ext_db::{Database, DbError};
use tracing::{debug, info, warn};

pub struct HookDispatcher {
    db: Database,
}

impl HookDispatcher {
    pub fn new(db: Database) -> Self {
        HookDispatcher { db }
    }

    pub async fn dispatch(&self, event: &HostEvent) -> HookOutcome {
        let mut outcome = HookOutcome::for_event(event);
        debug!(event = event.name(), "Dispatching host event");

        let settings = match self.db.settings().load().await {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "Failed to load module settings, using defaults");
                ModuleSettings::default()
            }
        };

        match event {
            HostEvent::ProductSaved(payload) => {
                if settings.is_enabled(ExtModule::Containers) {
                    if let Err(e) = self.product_saved(payload).await {
                        record_failure(&mut outcome, ExtModule::Containers, e);
                    }
                }
            }
            HostEvent::OrderCreated(payload) => {
                if settings.is_enabled(ExtModule::Containers) {
                    match self.order_created(payload).await {
                        Ok(movements) => outcome.movements = movements,
                        Err(e) => record_failure(&mut outcome, ExtModule::Containers, e),
                    }
                }
            }
            HostEvent::FooterRender => {
                outcome.fragments = footer_fragments(|m| settings.is_enabled(m));
            }
            HostEvent::OptionsAssembly => {
                outcome.sections = settings.option_sections();
            }
        }

        info!(
            event = %outcome.event,
            movements = outcome.movements.len(),
            failures = outcome.failures.len(),
            "Host event handled"
        );

        outcome
    }

    async fn product_saved(&self, payload: &ProductSavedPayload) -> Result<(), DbError> {
        let containers = self.db.containers();
        match &payload.container_type_id {
            Some(type_id) => {
                let quantity = payload.container_quantity.unwrap_or(1);
                containers
                    .link_product(&payload.product_id, type_id, quantity)
                    .await?;
            }
            None => {
                containers.unlink_product(&payload.product_id).await?;
            }
        }
        Ok(())
    }

    async fn order_created(
        &self,
        payload: &OrderCreatedPayload,
    ) -> Result<Vec<ContainerMovement>, DbError> {
        self.db
            .containers()
            .give_for_order(
                &payload.order_id,
                payload.customer_id.as_deref(),
                &payload.lines,
            )
            .await
    }
}

fn record_failure(outcome: &mut HookOutcome, module: ExtModule, err: DbError) {
    warn!(
        event = %outcome.event,
        module = %module,
        error = %err,
        "Module failed to handle host event"
    );
    outcome.failures.push(HookFailure {
        module,
        message: err.to_string(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use titan_ext_core::containers::NewContainerType;
    use titan_ext_core::hooks::OrderLine;
    use titan_ext_db::{DbConfig, NewCustomer, NewProduct};

    async fn setup() -> (Database, String, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let product = db
            .products()
            .insert(&NewProduct {
                sku: "BEV-1".to_string(),
                name: "Pilsner crate".to_string(),
                price_cents: 2_000,
                cost_cents: 1_400,
                current_stock: 50,
            })
            .await
            .unwrap();
        let container = db
            .containers()
            .create_type(&NewContainerType {
                name: "Crate".to_string(),
                capacity_ml: None,
                deposit_fee_cents: 150,
            })
            .await
            .unwrap();
        db.containers()
            .adjust_inventory(&container.id, 20, None)
            .await
            .unwrap();
        let customer = db
            .customers()
            .insert(&NewCustomer {
                name: "Dana Novak".to_string(),
                email: None,
                is_special: false,
            })
            .await
            .unwrap();
        (db, product.id, container.id, customer.id)
    }

    #[tokio::test]
    async fn test_product_saved_then_order_created() {
        let (db, product_id, type_id, customer_id) = setup().await;
        let hooks = HookDispatcher::new(db.clone());

        let outcome = hooks
            .dispatch(&HostEvent::ProductSaved(ProductSavedPayload {
                product_id: product_id.clone(),
                container_type_id: Some(type_id.clone()),
                container_quantity: Some(2),
            }))
            .await;
        assert!(outcome.is_clean());

        let outcome = hooks
            .dispatch(&HostEvent::OrderCreated(OrderCreatedPayload {
                order_id: "order-1".to_string(),
                customer_id: Some(customer_id.clone()),
                lines: vec![OrderLine {
                    product_id: product_id.clone(),
                    quantity: 3,
                }],
            }))
            .await;
        assert!(outcome.is_clean());
        assert_eq!(outcome.movements.len(), 1);
        assert_eq!(outcome.movements[0].quantity, 6);

        let balance = db
            .containers()
            .balance(&customer_id, &type_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(balance.balance, 6);
    }

    #[tokio::test]
    async fn test_product_saved_without_type_unlinks() {
        let (db, product_id, type_id, _) = setup().await;
        db.containers()
            .link_product(&product_id, &type_id, 1)
            .await
            .unwrap();

        let outcome = HookDispatcher::new(db.clone())
            .dispatch(&HostEvent::ProductSaved(ProductSavedPayload {
                product_id: product_id.clone(),
                container_type_id: None,
                container_quantity: None,
            }))
            .await;
        assert!(outcome.is_clean());
        assert!(db.containers().product_link(&product_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failure_reported_not_raised() {
        let (db, product_id, _, _) = setup().await;

        let outcome = HookDispatcher::new(db)
            .dispatch(&HostEvent::ProductSaved(ProductSavedPayload {
                product_id,
                container_type_id: Some("missing-type".to_string()),
                container_quantity: None,
            }))
            .await;
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].module, ExtModule::Containers);
    }

    #[tokio::test]
    async fn test_disabled_module_skipped() {
        let (db, product_id, type_id, _) = setup().await;
        db.settings().set("containers.enabled", "false").await.unwrap();

        let hooks = HookDispatcher::new(db.clone());
        hooks
            .dispatch(&HostEvent::ProductSaved(ProductSavedPayload {
                product_id: product_id.clone(),
                container_type_id: Some(type_id),
                container_quantity: None,
            }))
            .await;
        assert!(db.containers().product_link(&product_id).await.unwrap().is_none());

        let outcome = hooks.dispatch(&HostEvent::FooterRender).await;
        assert_eq!(outcome.fragments.len(), 2);
        assert!(outcome
            .fragments
            .iter()
            .all(|f| f.module != ExtModule::Containers));
    }

    #[tokio::test]
    async fn test_options_assembly_lists_every_module() {
        let (db, ..) = setup().await;
        let outcome = HookDispatcher::new(db)
            .dispatch(&HostEvent::OptionsAssembly)
            .await;
        assert_eq!(outcome.sections.len(), 3);
    }
}
