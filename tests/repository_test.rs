mod common;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::Set;
use serde_json::{json, Map, Value};

use common::TestApp;
use ecommerce_api::{
    dto::{NewCategory, NewProduct, NewReview},
    entities::UserRole,
    errors::ServiceError,
    services::orders::{OrderItemInput, PlaceOrderRequest},
};

fn changes(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

#[tokio::test]
async fn unknown_field_is_rejected_and_the_row_is_unchanged() {
    let app = TestApp::new().await;
    let repos = &app.state.services.repositories;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;

    let err = repos
        .products
        .update(mouse.id, changes(json!({"name": "Trackball", "colour": "red"})))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(msg) if msg.contains("colour"));

    let stored = repos.products.find(mouse.id).await.unwrap();
    assert_eq!(stored, mouse);
}

#[tokio::test]
async fn protected_and_primary_key_columns_cannot_change() {
    let app = TestApp::new().await;
    let repos = &app.state.services.repositories;
    let admin = repos.clients.find(1).await.unwrap();

    for attempt in [
        json!({"role": "USER"}),
        json!({"password_hash": "x"}),
        json!({"id": 99}),
    ] {
        let err = repos
            .clients
            .update(admin.id, changes(attempt))
            .await
            .unwrap_err();
        assert_matches!(err, ServiceError::ValidationError(_));
    }
    assert_eq!(repos.clients.find(admin.id).await.unwrap(), admin);
}

#[tokio::test]
async fn update_skips_nulls_and_underscored_keys_and_validates_values() {
    let app = TestApp::new().await;
    let repos = &app.state.services.repositories;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;

    let updated = repos
        .products
        .update(
            mouse.id,
            changes(json!({"stock": 4, "name": null, "_links": {"self": "/x"}})),
        )
        .await
        .unwrap();
    assert_eq!(updated.stock, 4);
    assert_eq!(updated.name, "Mouse");

    let err = repos
        .products
        .update(mouse.id, changes(json!({"stock": "many"})))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let err = repos
        .products
        .update(mouse.id, changes(json!({"price": "-1"})))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
    assert_eq!(repos.products.find(mouse.id).await.unwrap().stock, 4);
}

#[tokio::test]
async fn find_all_orders_by_id_and_clamps_the_page() {
    let app = TestApp::new().await;
    let categories = &app.state.services.repositories.categories;
    for n in 0..5 {
        categories
            .save(
                NewCategory {
                    name: format!("Category {n}"),
                    description: None,
                }
                .into(),
            )
            .await
            .unwrap();
    }

    let page = categories.find_all(1, 2).await.unwrap();
    let ids: Vec<i32> = page.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![2, 3]);

    // max_limit is 100 in the harness
    assert_eq!(categories.find_all(0, 10_000).await.unwrap().len(), 5);

    assert_matches!(
        categories.find_all(-1, 10).await,
        Err(ServiceError::ValidationError(_))
    );
    assert_matches!(
        categories.find_all(0, 0).await,
        Err(ServiceError::ValidationError(_))
    );
}

#[tokio::test]
async fn remove_reports_missing_rows_and_foreign_key_conflicts() {
    let app = TestApp::new().await;
    let repos = &app.state.services.repositories;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;
    let review = repos
        .reviews
        .save(
            NewReview {
                rating: 5,
                comment: Some("great".into()),
                product_id: mouse.id,
            }
            .into(),
        )
        .await
        .unwrap();

    repos.reviews.remove(review.id).await.unwrap();
    assert_matches!(
        repos.reviews.remove(review.id).await,
        Err(ServiceError::NotFound(_))
    );
    assert_matches!(repos.reviews.find(review.id).await, Err(ServiceError::NotFound(_)));

    let placed = app
        .state
        .services
        .orders
        .place_order(
            PlaceOrderRequest {
                client_name: "Ana Lopez".into(),
                client_email: "ana@example.com".into(),
                client_phone: None,
                shipping_address: None,
                payment_method: "CASH".into(),
                delivery_method: None,
                client_id: None,
                bill_id: None,
                items: vec![OrderItemInput {
                    product_id: mouse.id,
                    quantity: 1,
                    price: dec!(25),
                }],
                subtotal: dec!(25),
                tax: dec!(0),
                shipping_cost: dec!(0),
                total: dec!(25),
            },
            None,
        )
        .await
        .unwrap();

    // orders restrict deleting their client
    assert_matches!(
        repos.clients.remove(placed.client_id).await,
        Err(ServiceError::Conflict(_))
    );
    assert!(repos.clients.find(placed.client_id).await.is_ok());
}

#[tokio::test]
async fn dangling_references_on_write_are_not_found() {
    let app = TestApp::new().await;
    let repos = &app.state.services.repositories;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;

    let err = repos
        .products
        .save(
            NewProduct {
                name: "Orphan".into(),
                price: dec!(1),
                stock: 0,
                category_id: Some(4_040),
            }
            .into(),
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(msg) if msg.contains("Product"));
    assert_eq!(app.count::<ecommerce_api::entities::product::Entity>().await, 1);

    let err = repos
        .products
        .update(mouse.id, changes(json!({"category_id": 4_040})))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
    assert_eq!(repos.products.find(mouse.id).await.unwrap().category_id, None);
}

#[tokio::test]
async fn duplicate_email_insert_is_a_conflict() {
    let app = TestApp::new().await;
    let clients = &app.state.services.repositories.clients;
    let admin = clients.find(1).await.unwrap();

    let err = clients
        .save(ecommerce_api::entities::client::ActiveModel {
            name: Set("Copy".into()),
            lastname: Set("Cat".into()),
            email: Set(admin.email.to_uppercase()),
            telephone: Set(None),
            password_hash: Set(None),
            role: Set(UserRole::User),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::Conflict(_));
    assert_eq!(app.count::<ecommerce_api::entities::client::Entity>().await, 1);
}
