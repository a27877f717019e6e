//! Projections fed by real domain flows through the shared store.

use std::sync::Arc;

use domain::{
    Aggregate, CartRegistry, CartService, InMemoryUserDirectory, ListProduct, Money, OrderStatus,
    ProductService, UserDirectory,
};
use event_store::{AppendOptions, EventRecord, EventStore, InMemoryEventStore};
use projections::{BuyerOrdersView, CatalogView, ProjectionProcessor, SellerOrdersView};

struct Market {
    store: InMemoryEventStore,
    carts: CartService<InMemoryEventStore>,
    products: ProductService<InMemoryEventStore>,
    directory: InMemoryUserDirectory,
}

fn market() -> Market {
    let store = InMemoryEventStore::new();
    let directory = InMemoryUserDirectory::new();
    let arc: Arc<dyn UserDirectory> = Arc::new(directory.clone());
    Market {
        store: store.clone(),
        carts: CartService::new(store.clone(), CartRegistry::new(), arc.clone()),
        products: ProductService::new(store, arc),
        directory,
    }
}

async fn append_checkout(store: &InMemoryEventStore, order: &domain::Order) {
    // Drive the checkout event through the store the way the
    // coordinator does, so projections can observe it.
    let events = order.check_out().unwrap();
    let mut version = order.version();
    let records: Vec<EventRecord> = events
        .iter()
        .map(|event| {
            version = version.next();
            EventRecord::builder()
                .aggregate_id(order.id().unwrap())
                .aggregate_type("Order")
                .event_type(domain::DomainEvent::event_type(event))
                .version(version)
                .payload(event)
                .unwrap()
                .build()
        })
        .collect();
    store
        .append(records, AppendOptions::expect_version(order.version()))
        .await
        .unwrap();
}

#[tokio::test]
async fn catalog_tracks_listings_from_the_store() {
    let m = market();
    let seller = m.directory.register_seller().await;

    let product_id = m
        .products
        .list_product(
            seller.as_uuid(),
            ListProduct {
                name: "Tomatoes 1kg".to_string(),
                description: "Vine ripened".to_string(),
                price: Money::from_cents(450),
                category_id: None,
                initial_stock: 10,
            },
        )
        .await
        .unwrap();
    m.products.adjust_stock(product_id, -4).await.unwrap();

    let catalog = CatalogView::new();
    let mut processor = ProjectionProcessor::new(m.store.clone());
    processor.register(Box::new(catalog.clone()));
    processor.run_catch_up().await.unwrap();

    let entry = catalog.get(product_id).await.unwrap();
    assert_eq!(entry.stock, 6);
    assert_eq!(entry.price, Money::from_cents(450));
    assert_eq!(catalog.by_seller(seller).await.len(), 1);
}

#[tokio::test]
async fn order_views_see_checkout_but_not_the_cart() {
    let m = market();
    let buyer = m.directory.register_buyer().await;
    let seller = m.directory.register_seller().await;

    let product_id = m
        .products
        .list_product(
            seller.as_uuid(),
            ListProduct {
                name: "Okra 500g".to_string(),
                description: String::new(),
                price: Money::from_cents(300),
                category_id: None,
                initial_stock: 10,
            },
        )
        .await
        .unwrap();

    let cart = m.carts.add_item(buyer.as_uuid(), product_id, 3).await.unwrap();

    let seller_orders = SellerOrdersView::new();
    let buyer_orders = BuyerOrdersView::new();
    let mut processor = ProjectionProcessor::new(m.store.clone());
    processor.register(Box::new(seller_orders.clone()));
    processor.register(Box::new(buyer_orders.clone()));

    // Before checkout the order is still a private cart.
    processor.run_catch_up().await.unwrap();
    assert!(seller_orders.orders_for(seller).await.is_empty());
    assert!(buyer_orders.orders_for(buyer).await.is_empty());

    append_checkout(&m.store, &cart).await;
    processor.run_catch_up().await.unwrap();

    let for_seller = seller_orders.orders_for(seller).await;
    assert_eq!(for_seller.len(), 1);
    assert_eq!(for_seller[0].subtotal, Money::from_cents(900));
    assert_eq!(for_seller[0].status, OrderStatus::Pending);

    let history = buyer_orders.orders_for(buyer).await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].total, Money::from_cents(900));
}

#[tokio::test]
async fn rebuild_reaches_the_same_state() {
    let m = market();
    let buyer = m.directory.register_buyer().await;
    let seller = m.directory.register_seller().await;

    let product_id = m
        .products
        .list_product(
            seller.as_uuid(),
            ListProduct {
                name: "Honey 1L".to_string(),
                description: String::new(),
                price: Money::from_cents(2500),
                category_id: None,
                initial_stock: 5,
            },
        )
        .await
        .unwrap();
    let cart = m.carts.add_item(buyer.as_uuid(), product_id, 2).await.unwrap();
    append_checkout(&m.store, &cart).await;

    let buyer_orders = BuyerOrdersView::new();
    let mut processor = ProjectionProcessor::new(m.store.clone());
    processor.register(Box::new(buyer_orders.clone()));

    processor.run_catch_up().await.unwrap();
    let before = buyer_orders.orders_for(buyer).await;

    processor.rebuild_all().await.unwrap();
    let after = buyer_orders.orders_for(buyer).await;

    assert_eq!(before.len(), after.len());
    assert_eq!(before[0].total, after[0].total);
    assert_eq!(before[0].status, after[0].status);
}
