mod common;

use assert_matches::assert_matches;
use axum::http::{Method, StatusCode};
use rust_decimal_macros::dec;
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
use serde_json::{json, Value};

use common::{RecordingNotifier, TestApp};
use ecommerce_api::{
    entities::{bill, client, order, order_detail, DeliveryMethod, OrderStatus, UserRole},
    errors::ServiceError,
    services::orders::{DeliveryMethodInput, OrderItemInput, PlaceOrderRequest},
};

fn request(email: &str, items: Vec<OrderItemInput>) -> PlaceOrderRequest {
    let subtotal = items.iter().map(OrderItemInput::line_total).sum();
    PlaceOrderRequest {
        client_name: "Ana Maria Lopez".into(),
        client_email: email.into(),
        client_phone: Some("+5491155550000".into()),
        shipping_address: Some("Av. Siempre Viva 742".into()),
        payment_method: "CARD".into(),
        delivery_method: None,
        client_id: None,
        bill_id: None,
        items,
        subtotal,
        tax: dec!(0),
        shipping_cost: dec!(0),
        total: subtotal,
    }
}

fn item(product_id: i32, quantity: i32, price: rust_decimal::Decimal) -> OrderItemInput {
    OrderItemInput {
        product_id,
        quantity,
        price,
    }
}

#[tokio::test]
async fn new_email_creates_client_bill_order_and_every_line() {
    let app = TestApp::new().await;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;
    let pad = app.seed_product("Pad", dec!(5.50), None).await;
    let clients_before = app.count::<client::Entity>().await;

    let view = app
        .state
        .services
        .orders
        .place_order(
            request(
                "Ana@Example.com",
                vec![item(mouse.id, 2, dec!(25)), item(pad.id, 1, dec!(5.50))],
            ),
            None,
        )
        .await
        .unwrap();

    assert_eq!(app.count::<client::Entity>().await, clients_before + 1);
    assert_eq!(app.count::<bill::Entity>().await, 1);
    assert_eq!(app.count::<order::Entity>().await, 1);
    assert_eq!(app.count::<order_detail::Entity>().await, 2);

    assert_eq!(view.status, OrderStatus::Pending);
    assert_eq!(view.delivery_method, DeliveryMethod::HomeDelivery);
    assert_eq!(view.total, dec!(55.50));

    let guest = client::Entity::find_by_id(view.client_id)
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(guest.email, "ana@example.com");
    assert_eq!(guest.name, "Ana");
    assert_eq!(guest.lastname, "Maria Lopez");
    assert!(guest.password_hash.is_none());
    assert_eq!(guest.role, UserRole::User);

    let generated = bill::Entity::find_by_id(view.bill_id)
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert!(generated.bill_number.starts_with("BILL-"));
    assert_eq!(generated.discount, dec!(0));
    assert_eq!(generated.total, dec!(55.50));
    assert_eq!(generated.client_id, Some(guest.id));
}

#[tokio::test]
async fn missing_product_rolls_back_client_and_bill() {
    let app = TestApp::new().await;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;
    let clients_before = app.count::<client::Entity>().await;

    let err = app
        .state
        .services
        .orders
        .place_order(
            request(
                "rollback@example.com",
                vec![item(mouse.id, 1, dec!(25)), item(9_999, 1, dec!(1))],
            ),
            None,
        )
        .await
        .unwrap_err();

    assert_matches!(err, ServiceError::NotFound(_));
    assert_eq!(app.count::<client::Entity>().await, clients_before);
    assert_eq!(app.count::<bill::Entity>().await, 0);
    assert_eq!(app.count::<order::Entity>().await, 0);
    assert_eq!(app.count::<order_detail::Entity>().await, 0);
}

#[tokio::test]
async fn existing_client_and_bill_are_reused() {
    let app = TestApp::new().await;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;
    let first = app
        .state
        .services
        .orders
        .place_order(request("repeat@example.com", vec![item(mouse.id, 1, dec!(25))]), None)
        .await
        .unwrap();
    let clients = app.count::<client::Entity>().await;

    let mut again = request("someone-else@example.com", vec![item(mouse.id, 3, dec!(25))]);
    again.client_id = Some(first.client_id);
    again.bill_id = Some(first.bill_id);
    let second = app
        .state
        .services
        .orders
        .place_order(again, None)
        .await
        .unwrap();

    assert_eq!(second.client_id, first.client_id);
    assert_eq!(second.bill_id, first.bill_id);
    assert_eq!(app.count::<client::Entity>().await, clients);
    assert_eq!(app.count::<bill::Entity>().await, 1);
    assert_eq!(app.count::<order::Entity>().await, 2);
}

#[tokio::test]
async fn known_email_reuses_the_client() {
    let app = TestApp::new().await;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;
    let orders = &app.state.services.orders;

    let first = orders
        .place_order(request("same@example.com", vec![item(mouse.id, 1, dec!(25))]), None)
        .await
        .unwrap();
    let second = orders
        .place_order(request("SAME@example.com", vec![item(mouse.id, 1, dec!(25))]), None)
        .await
        .unwrap();

    assert_eq!(first.client_id, second.client_id);
    assert_ne!(first.bill_id, second.bill_id);
}

#[tokio::test]
async fn unknown_client_or_bill_id_is_not_found_and_nothing_persists() {
    let app = TestApp::new().await;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;
    let clients_before = app.count::<client::Entity>().await;

    let mut with_client = request("ghost@example.com", vec![item(mouse.id, 1, dec!(25))]);
    with_client.client_id = Some(4_242);
    let err = app
        .state
        .services
        .orders
        .place_order(with_client, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    let mut with_bill = request("ghost@example.com", vec![item(mouse.id, 1, dec!(25))]);
    with_bill.bill_id = Some(4_242);
    let err = app
        .state
        .services
        .orders
        .place_order(with_bill, None)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));

    assert_eq!(app.count::<client::Entity>().await, clients_before);
    assert_eq!(app.count::<order::Entity>().await, 0);
}

#[tokio::test]
async fn delivery_codes_are_normalized_when_stored() {
    let app = TestApp::new().await;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;
    let cases = [
        (Some(DeliveryMethodInput::Code(1)), DeliveryMethod::DriveThru),
        (Some(DeliveryMethodInput::Code(2)), DeliveryMethod::OnHand),
        (Some(DeliveryMethodInput::Code(3)), DeliveryMethod::HomeDelivery),
        (Some(DeliveryMethodInput::Code(42)), DeliveryMethod::HomeDelivery),
        (Some(DeliveryMethodInput::Label("on hand".into())), DeliveryMethod::OnHand),
        (None, DeliveryMethod::HomeDelivery),
    ];

    for (input, expected) in cases {
        let mut req = request("delivery@example.com", vec![item(mouse.id, 1, dec!(25))]);
        req.delivery_method = input;
        let view = app
            .state
            .services
            .orders
            .place_order(req, None)
            .await
            .unwrap();
        let stored = order::Entity::find_by_id(view.id)
            .one(app.state.db.as_ref())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.delivery_method, expected);
    }
}

#[tokio::test]
async fn large_amount_order_over_http() {
    let app = TestApp::new().await;
    let product = app.seed_product("Notebook", dec!(1500000), None).await;
    assert_eq!(product.id, 1);

    // pad ids so the product under test is #7
    for n in 2..=6 {
        app.seed_product(&format!("Filler {n}"), dec!(1), None).await;
    }
    let seventh = app.seed_product("Workstation", dec!(1500000), None).await;
    assert_eq!(seventh.id, 7);

    let (status, body) = app
        .post(
            "/api/v1/orders",
            json!({
                "client_name": "Juan Perez",
                "client_email": "juan@example.com",
                "client_phone": "+5491100000000",
                "shipping_address": "Calle 1",
                "payment_method": "cash",
                "delivery_method": 1,
                "items": [{"product_id": 7, "quantity": 2, "price": 1500000}],
                "subtotal": 3000000,
                "tax": 480000,
                "shipping_cost": 0,
                "total": 3480000
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["success"], true);

    let order_id = body["data"]["id"].as_i64().unwrap() as i32;
    let stored = order::Entity::find_by_id(order_id)
        .one(app.state.db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.total, dec!(3480000));
    assert_eq!(stored.delivery_method, DeliveryMethod::DriveThru);

    let details = order_detail::Entity::find()
        .filter(order_detail::Column::OrderId.eq(order_id))
        .all(app.state.db.as_ref())
        .await
        .unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].product_id, 7);
    assert_eq!(details[0].quantity, 2);
}

#[tokio::test]
async fn fetched_order_carries_client_and_products() {
    let app = TestApp::new().await;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;
    let pad = app.seed_product("Pad", dec!(5), None).await;
    let placed = app
        .state
        .services
        .orders
        .place_order(
            request("eager@example.com", vec![item(mouse.id, 1, dec!(25)), item(pad.id, 2, dec!(5))]),
            None,
        )
        .await
        .unwrap();

    let (status, body) = app.get(&format!("/api/v1/orders/{}", placed.id)).await;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["client"]["email"], "eager@example.com");
    assert!(data["client"].get("password_hash").is_none());

    let details = data["details"].as_array().unwrap();
    assert_eq!(details.len(), 2);
    let names: Vec<&str> = details
        .iter()
        .map(|d| d["product"]["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"Mouse"));
    assert!(names.contains(&"Pad"));

    let (status, list) = app.get("/api/v1/orders?skip=0&limit=10").await;
    assert_eq!(status, StatusCode::OK);
    let listed = list["data"].as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["details"].as_array().unwrap().len(), 2);
    assert_eq!(listed[0]["client"]["id"], data["client"]["id"]);
}

#[tokio::test]
async fn confirmation_lists_product_names_after_commit() {
    let app = TestApp::new().await;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;
    let placed = app
        .state
        .services
        .orders
        .place_order(request("mail@example.com", vec![item(mouse.id, 2, dec!(25))]), None)
        .await
        .unwrap();

    let sent = app.notifier.wait_for(1).await;
    assert_eq!(sent.len(), 1);
    let confirmation = &sent[0];
    assert_eq!(confirmation.order_id, placed.id);
    assert_eq!(confirmation.email, "mail@example.com");
    assert_eq!(confirmation.client_name, "Ana Maria Lopez");
    assert_eq!(confirmation.total, dec!(50));
    assert_eq!(confirmation.lines[0].product_name, "Mouse");
    assert_eq!(confirmation.lines[0].quantity, 2);
}

#[tokio::test]
async fn notifier_failure_keeps_the_order() {
    let app = TestApp::with_notifier(RecordingNotifier::failing()).await;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;

    let (status, body) = app
        .post(
            "/api/v1/orders",
            json!({
                "name": "Solo",
                "email": "solo@example.com",
                "payment_method": "CASH",
                "items": [{"product_id": mouse.id, "quantity": 1, "price": "25"}],
                "subtotal": "25",
                "tax": "0",
                "shipping_cost": "0",
                "total": "25"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    app.notifier.wait_for(1).await;
    assert_eq!(app.count::<order::Entity>().await, 1);
    let (status, _) = app
        .get(&format!("/api/v1/orders/{}", body["data"]["id"]))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn authenticated_caller_becomes_the_order_client() {
    let app = TestApp::new().await;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;
    let token = app.user_token("buyer@example.com").await;

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "client_name": "Whoever",
                "client_email": "other@example.com",
                "payment_method": "DEBIT",
                "items": [{"product_id": mouse.id, "quantity": 1, "price": 25}],
                "subtotal": 25, "tax": 0, "shipping_cost": 0, "total": 25
            })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["client"]["email"], "buyer@example.com");

    // a client_id in the body cannot redirect the order to someone else
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders",
            Some(json!({
                "client_name": "Whoever",
                "client_email": "other@example.com",
                "client_id": 1,
                "payment_method": "DEBIT",
                "items": [{"product_id": mouse.id, "quantity": 1, "price": 25}],
                "subtotal": 25, "tax": 0, "shipping_cost": 0, "total": 25
            })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["client"]["email"], "buyer@example.com");
    assert_ne!(body["data"]["client_id"], 1);
}

#[tokio::test]
async fn invalid_orders_are_rejected_before_any_write() {
    let app = TestApp::new().await;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;
    let base = json!({
        "client_name": "Ana Lopez",
        "client_email": "ana@example.com",
        "payment_method": "CARD",
        "items": [{"product_id": mouse.id, "quantity": 1, "price": 25}],
        "subtotal": 25, "tax": 0, "shipping_cost": 0, "total": 25
    });

    let mut bad_total = base.clone();
    bad_total["total"] = json!(30);
    let mut no_items = base.clone();
    no_items["items"] = json!([]);
    let mut bad_quantity = base.clone();
    bad_quantity["items"] = json!([{"product_id": mouse.id, "quantity": 0, "price": 25}]);
    bad_quantity["subtotal"] = json!(0);
    bad_quantity["total"] = json!(0);
    let mut bad_email = base.clone();
    bad_email["client_email"] = json!("not-an-email");
    let mut bad_payment = base.clone();
    bad_payment["payment_method"] = json!("BARTER");
    let mut missing_name = base.clone();
    missing_name.as_object_mut().unwrap().remove("client_name");

    for payload in [bad_total, no_items, bad_quantity, bad_email, bad_payment, missing_name] {
        let (status, body) = app.post("/api/v1/orders", payload.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{payload} -> {body}");
        assert_eq!(body["success"], Value::Null);
    }
    assert_eq!(app.count::<order::Entity>().await, 0);
    assert_eq!(app.count::<bill::Entity>().await, 0);
}

#[tokio::test]
async fn order_update_rejects_unknown_fields_and_delete_cascades() {
    let app = TestApp::new().await;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;
    let placed = app
        .state
        .services
        .orders
        .place_order(request("upd@example.com", vec![item(mouse.id, 1, dec!(25))]), None)
        .await
        .unwrap();
    let uri = format!("/api/v1/orders/{}", placed.id);

    let (status, _) = app
        .request(Method::PUT, &uri, Some(json!({"colour": "red"})), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .request(Method::PUT, &uri, Some(json!({"status": "DELIVERED"})), None)
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "DELIVERED");

    let (status, _) = app.request(Method::DELETE, &uri, None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.count::<order_detail::Entity>().await, 0);

    let (status, _) = app.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn concurrent_orders_for_one_new_email_share_a_single_client() {
    use fake::{faker::internet::en::SafeEmail, Fake};

    let app = TestApp::new().await;
    let mouse = app.seed_product("Mouse", dec!(25), None).await;
    let email: String = SafeEmail().fake();
    let orders = app.state.services.orders.clone();

    let placed = futures::future::join_all((0..4).map(|_| {
        let orders = orders.clone();
        let req = request(&email, vec![item(mouse.id, 1, dec!(25))]);
        async move { orders.place_order(req, None).await }
    }))
    .await;

    let client_ids: Vec<i32> = placed
        .into_iter()
        .map(|result| result.expect("order placed").client_id)
        .collect();
    assert!(client_ids.windows(2).all(|pair| pair[0] == pair[1]));
    assert_eq!(
        client::Entity::find()
            .filter(client::Column::Email.eq(email.to_lowercase()))
            .all(app.state.db.as_ref())
            .await
            .unwrap()
            .len(),
        1
    );
}
