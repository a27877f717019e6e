use common::AggregateId;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use domain::{BuyerId, CartLine, DomainEvent, Money, OrderEvent, ProductId, SellerId};
use event_store::{EventRecord, Version};
use projections::{Projection, SellerOrdersView};
use tokio::runtime::Runtime;

fn order_stream(orders: usize, lines_per_order: usize) -> Vec<EventRecord> {
    let seller = SellerId::new();
    let mut records = Vec::new();

    for _ in 0..orders {
        let order_id = AggregateId::new();
        let mut version = Version::initial();
        let mut events = vec![OrderEvent::cart_opened(order_id, BuyerId::new())];
        let mut total = Money::zero();

        for i in 0..lines_per_order {
            let line = CartLine::new(
                ProductId::new(),
                format!("Product {i}"),
                seller,
                2,
                Money::from_cents(500),
            );
            total += line.line_total();
            events.push(OrderEvent::line_added(&line));
        }
        events.push(OrderEvent::checked_out(total, lines_per_order));

        for event in events {
            version = version.next();
            records.push(
                EventRecord::builder()
                    .aggregate_id(order_id)
                    .aggregate_type("Order")
                    .event_type(event.event_type())
                    .version(version)
                    .payload(&event)
                    .unwrap()
                    .build(),
            );
        }
    }

    records
}

fn bench_seller_orders_feed(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let records = order_stream(50, 4);

    c.bench_function("seller_orders_feed_50_orders", |b| {
        b.to_async(&rt).iter(|| {
            let records = records.clone();
            async move {
                let view = SellerOrdersView::new();
                for record in &records {
                    view.handle(black_box(record)).await.unwrap();
                }
                black_box(view.position().await)
            }
        })
    });
}

criterion_group!(benches, bench_seller_orders_feed);
criterion_main!(benches);
