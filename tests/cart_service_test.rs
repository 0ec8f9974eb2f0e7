mod common;

use assert_matches::assert_matches;
use common::{seed_variant, TestServices};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use storefront_orders::{
    entities::commerce::{cart_item, product_variant},
    errors::ServiceError,
    events::Event,
    services::commerce::AddToCartInput,
};
use uuid::Uuid;

#[tokio::test]
async fn customer_without_cart_sees_empty_view() {
    let svc = TestServices::new().await;

    let view = svc.carts.get_cart(Uuid::new_v4()).await.unwrap();

    assert!(view.id.is_none());
    assert!(view.items.is_empty());
    assert_eq!(view.subtotal, "0.00");
    assert_eq!(view.currency, "USD");
}

#[tokio::test]
async fn adding_items_creates_cart_and_bumps_version() {
    let mut svc = TestServices::new().await;
    let customer = Uuid::new_v4();

    svc.add_to_cart(customer, "TEE-BLK-M", dec!(45.00), 2).await;
    let first = svc.carts.get_cart(customer).await.unwrap();
    assert!(first.id.is_some());
    assert_eq!(first.version, 1);
    assert_eq!(first.items.len(), 1);
    assert_eq!(first.items[0].sku, "TEE-BLK-M");
    assert_eq!(first.items[0].unit_price, "45.00");
    assert_eq!(first.items[0].line_total, "90.00");

    svc.add_to_cart(customer, "MUG-WHT", dec!(15.00), 1).await;
    let second = svc.carts.get_cart(customer).await.unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.version, 2);
    assert_eq!(second.subtotal, "105.00");

    let events = svc.drain_events();
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Event::CartUpdated { .. }))
            .count(),
        2
    );
}

#[tokio::test]
async fn adding_same_variant_merges_and_keeps_captured_price() {
    let svc = TestServices::new().await;
    let customer = Uuid::new_v4();
    let variant = svc.add_to_cart(customer, "TEE-BLK-M", dec!(45.00), 1).await;

    let mut repriced: product_variant::ActiveModel = variant.clone().into();
    repriced.price = Set(dec!(50.00));
    repriced.update(&*svc.db).await.unwrap();

    let view = svc
        .carts
        .add_item(
            customer,
            AddToCartInput {
                variant_id: variant.id,
                quantity: 2,
            },
        )
        .await
        .unwrap();

    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].quantity, 3);
    assert_eq!(view.items[0].unit_price, "45.00");
    assert_eq!(view.subtotal, "135.00");
}

#[tokio::test]
async fn merging_past_the_line_limit_is_rejected() {
    let svc = TestServices::new().await;
    let customer = Uuid::new_v4();
    let variant = svc.add_to_cart(customer, "SOCK-PK", dec!(12.50), 999).await;

    let merged = svc
        .carts
        .add_item(
            customer,
            AddToCartInput {
                variant_id: variant.id,
                quantity: 1,
            },
        )
        .await;
    assert_matches!(merged, Err(ServiceError::ValidationError(_)));

    let view = svc.carts.get_cart(customer).await.unwrap();
    assert_eq!(view.items[0].quantity, 999);
    assert_eq!(view.version, 1);

    // The line can still be set to the limit directly
    let line = view.items[0].id;
    let view = svc.carts.update_item_quantity(customer, line, 999).await.unwrap();
    assert_eq!(view.items[0].quantity, 999);
}

#[tokio::test]
async fn captured_price_is_rounded_to_minor_units() {
    let svc = TestServices::new().await;
    let customer = Uuid::new_v4();
    svc.add_to_cart(customer, "STICKER", dec!(0.335), 3).await;

    let cart_id = svc.carts.get_cart(customer).await.unwrap().id.unwrap();
    let line = cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .one(&*svc.db)
        .await
        .unwrap()
        .expect("cart line");
    assert_eq!(line.unit_price, dec!(0.34));

    let view = svc.carts.get_cart(customer).await.unwrap();
    assert_eq!(view.subtotal, "1.02");
}

#[tokio::test]
async fn unknown_variant_and_bad_quantity_are_rejected() {
    let svc = TestServices::new().await;
    let customer = Uuid::new_v4();

    let missing = svc
        .carts
        .add_item(
            customer,
            AddToCartInput {
                variant_id: Uuid::new_v4(),
                quantity: 1,
            },
        )
        .await;
    assert_matches!(missing, Err(ServiceError::NotFound(_)));

    let variant = seed_variant(&*svc.db, "CAP", dec!(20.00)).await;
    let zero = svc
        .carts
        .add_item(
            customer,
            AddToCartInput {
                variant_id: variant.id,
                quantity: 0,
            },
        )
        .await;
    assert_matches!(zero, Err(ServiceError::ValidationError(_)));

    // Rejections never create a cart
    assert!(svc.carts.get_cart(customer).await.unwrap().id.is_none());
}

#[tokio::test]
async fn updating_quantity_to_zero_removes_the_line() {
    let svc = TestServices::new().await;
    let customer = Uuid::new_v4();
    svc.add_to_cart(customer, "TEE-BLK-M", dec!(45.00), 1).await;
    svc.add_to_cart(customer, "MUG-WHT", dec!(15.00), 1).await;
    let view = svc.carts.get_cart(customer).await.unwrap();
    let mug = view.items.iter().find(|l| l.sku == "MUG-WHT").unwrap().id;
    let tee = view.items.iter().find(|l| l.sku == "TEE-BLK-M").unwrap().id;

    let view = svc.carts.update_item_quantity(customer, tee, 4).await.unwrap();
    assert_eq!(view.subtotal, "195.00");

    let view = svc.carts.update_item_quantity(customer, mug, 0).await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.subtotal, "180.00");
    assert_eq!(view.version, 4);
}

#[tokio::test]
async fn cannot_touch_another_customers_cart_line() {
    let svc = TestServices::new().await;
    let owner = Uuid::new_v4();
    let intruder = Uuid::new_v4();
    svc.add_to_cart(owner, "TEE-BLK-M", dec!(45.00), 1).await;
    svc.add_to_cart(intruder, "MUG-WHT", dec!(15.00), 1).await;
    let line = svc.carts.get_cart(owner).await.unwrap().items[0].id;

    assert_matches!(
        svc.carts.remove_item(intruder, line).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(
        svc.carts.update_item_quantity(intruder, line, 5).await,
        Err(ServiceError::NotFound(_))
    );

    let owner_view = svc.carts.get_cart(owner).await.unwrap();
    assert_eq!(owner_view.items.len(), 1);
    assert_eq!(owner_view.items[0].quantity, 1);
}
