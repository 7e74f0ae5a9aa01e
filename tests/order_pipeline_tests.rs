use async_trait::async_trait;
use shop_order_consumer::adapter::driven::{
    DeliveryLedger, InMemoryDeadLetterQueue, InMemoryOrderPublisher, InMemoryOrderQueue,
    InMemoryProductRepository, InMemoryUserRepository,
};
use shop_order_consumer::application::consumer::{
    AckMode, ConsumerError, ConsumerSettings, OrderConsumer,
};
use shop_order_consumer::domain::message::OrderMessage;
use shop_order_consumer::domain::model::{Product, ProductId, User, UserId};
use shop_order_consumer::domain::port::{
    DeadLetter, DeadLetterQueue, Delivery, Logger, OrderPublisher, OrderQueue, ProductPatch, ProductRepository, QueueError,
    RepositoryError, StockDecrement, UserRepository,
};
use shop_order_consumer::domain::service::{
    OrderValidator, ReservationMode, StockReservationEngine,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

const TIMEOUT: Duration = Duration::from_secs(5);

// ログを記録するだけのロガー
#[derive(Default)]
struct RecordingLogger {
    lines: Mutex<Vec<String>>,
}

impl RecordingLogger {
    fn count(&self, needle: &str) -> usize {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|line| line.contains(needle))
            .count()
    }

    fn record(&self, level: &str, message: &str, context: Option<HashMap<String, String>>) {
        let mut line = format!("{} {}", level, message);
        if let Some(context) = context {
            let mut pairs: Vec<String> =
                context.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
            pairs.sort();
            line.push(' ');
            line.push_str(&pairs.join(" "));
        }
        self.lines.lock().unwrap().push(line);
    }
}

impl Logger for RecordingLogger {
    fn debug(&self, _: &str, m: &str, _: Option<Uuid>, c: Option<HashMap<String, String>>) {
        self.record("DEBUG", m, c);
    }
    fn info(&self, _: &str, m: &str, _: Option<Uuid>, c: Option<HashMap<String, String>>) {
        self.record("INFO", m, c);
    }
    fn warn(&self, _: &str, m: &str, _: Option<Uuid>, c: Option<HashMap<String, String>>) {
        self.record("WARN", m, c);
    }
    fn error(&self, _: &str, m: &str, _: Option<Uuid>, c: Option<HashMap<String, String>>) {
        self.record("ERROR", m, c);
    }
}

// 読み取りと減算を遅らせ、同時実行数を記録する商品リポジトリ
#[derive(Default)]
struct SlowProductRepository {
    inner: InMemoryProductRepository,
    delay: Duration,
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowProductRepository {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ProductRepository for SlowProductRepository {
    async fn save(&self, product: &Product) -> Result<(), RepositoryError> {
        self.inner.save(product).await
    }

    async fn find_by_id(&self, product_id: ProductId) -> Result<Option<Product>, RepositoryError> {
        self.enter();
        let found = self.inner.find_by_id(product_id).await;
        tokio::time::sleep(self.delay).await;
        self.leave();
        found
    }

    async fn find_all(&self) -> Result<Vec<Product>, RepositoryError> {
        self.inner.find_all().await
    }

    async fn update(&self, product: &Product) -> Result<bool, RepositoryError> {
        self.inner.update(product).await
    }

    async fn patch(
        &self,
        product_id: ProductId,
        patch: ProductPatch,
    ) -> Result<Option<Product>, RepositoryError> {
        self.inner.patch(product_id, patch).await
    }

    async fn delete(&self, product_id: ProductId) -> Result<bool, RepositoryError> {
        self.inner.delete(product_id).await
    }

    async fn decrement_stock_if_available(
        &self,
        product_id: ProductId,
        requested: u32,
    ) -> Result<StockDecrement, RepositoryError> {
        self.enter();
        tokio::time::sleep(self.delay).await;
        let result = self
            .inner
            .decrement_stock_if_available(product_id, requested)
            .await;
        self.leave();
        result
    }
}

// 最初の受信でブローカー障害を返すキュー
struct BrokenQueue;

#[async_trait]
impl OrderQueue for BrokenQueue {
    async fn receive(&mut self) -> Result<Option<Delivery>, QueueError> {
        Err(QueueError::BrokerUnavailable("connection reset".to_string()))
    }
}

// 最初の数回だけ保管を拒否し、その後は受け入れるデッドレターキュー
struct FlakyDeadLetterQueue {
    inner: InMemoryDeadLetterQueue,
    failures_left: AtomicUsize,
}

impl FlakyDeadLetterQueue {
    fn new(failures: usize) -> Self {
        Self {
            inner: InMemoryDeadLetterQueue::new(100),
            failures_left: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl DeadLetterQueue for FlakyDeadLetterQueue {
    async fn push(&self, letter: DeadLetter) -> Result<(), QueueError> {
        let refused = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(QueueError::DeadLetterRejected {
                delivery_tag: letter.delivery_tag,
                reason: "store unavailable".to_string(),
            });
        }
        self.inner.push(letter).await
    }
}

struct Pipeline {
    products: Arc<dyn ProductRepository>,
    users: Arc<InMemoryUserRepository>,
    dead_letters: Arc<InMemoryDeadLetterQueue>,
    logger: Arc<RecordingLogger>,
    user: User,
}

impl Pipeline {
    async fn new(products: Arc<dyn ProductRepository>) -> Self {
        let users = Arc::new(InMemoryUserRepository::new());
        let user = User::new(UserId::new(), "Alice".to_string(), 30);
        users.save(&user).await.unwrap();
        Self {
            products,
            users,
            dead_letters: Arc::new(InMemoryDeadLetterQueue::new(100)),
            logger: Arc::new(RecordingLogger::default()),
            user,
        }
    }

    async fn add_product(&self, quantity: u32) -> ProductId {
        let product = Product::new(ProductId::new(), "Keyboard".to_string(), quantity);
        self.products.save(&product).await.unwrap();
        product.id()
    }

    async fn stock(&self, product_id: ProductId) -> u32 {
        self.products
            .find_by_id(product_id)
            .await
            .unwrap()
            .unwrap()
            .quantity()
    }

    fn consumer<Q: OrderQueue>(
        &self,
        queue: Q,
        mode: ReservationMode,
        settings: ConsumerSettings,
    ) -> OrderConsumer<Q> {
        OrderConsumer::new(
            queue,
            Arc::new(OrderValidator::new(self.users.clone(), TIMEOUT)),
            Arc::new(StockReservationEngine::new(
                self.products.clone(),
                mode,
                TIMEOUT,
            )),
            self.dead_letters.clone(),
            self.logger.clone(),
            settings,
        )
    }

    /// メッセージを投入し、キューを閉じてコンシューマーを最後まで走らせる
    async fn run(
        &self,
        bodies: Vec<Vec<u8>>,
        mode: ReservationMode,
        settings: ConsumerSettings,
    ) -> DeliveryLedger {
        let (publisher, queue) = InMemoryOrderQueue::new();
        let ledger = queue.ledger();
        publish_all(&publisher, bodies).await;
        drop(publisher);

        self.consumer(queue, mode, settings).run().await.unwrap();
        ledger
    }

    fn order(&self, product_id: ProductId, quantity: i64) -> Vec<u8> {
        OrderMessage::new(product_id.to_string(), quantity, self.user.id().to_string())
            .to_vec()
            .unwrap()
    }
}

async fn publish_all(publisher: &InMemoryOrderPublisher, bodies: Vec<Vec<u8>>) {
    for body in bodies {
        publisher.publish(body).await.unwrap();
    }
}

fn fast_settings(max_in_flight: usize) -> ConsumerSettings {
    ConsumerSettings {
        pacing: Duration::ZERO,
        max_in_flight,
        ack_mode: AckMode::AfterOutcome,
    }
}

#[tokio::test]
async fn test_order_within_stock_decrements_it() {
    let pipeline = Pipeline::new(Arc::new(InMemoryProductRepository::new())).await;
    let product_id = pipeline.add_product(5).await;

    let ledger = pipeline
        .run(
            vec![pipeline.order(product_id, 3)],
            ReservationMode::Atomic,
            fast_settings(4),
        )
        .await;

    assert_eq!(pipeline.stock(product_id).await, 2);
    assert_eq!(ledger.acked_count().await, 1);
    assert!(pipeline.dead_letters.is_empty().await);
    assert_eq!(pipeline.logger.count("outcome=reserved"), 1);
}

#[tokio::test]
async fn test_order_beyond_stock_leaves_it_and_dead_letters() {
    let pipeline = Pipeline::new(Arc::new(InMemoryProductRepository::new())).await;
    let product_id = pipeline.add_product(2).await;

    let ledger = pipeline
        .run(
            vec![pipeline.order(product_id, 3)],
            ReservationMode::Atomic,
            fast_settings(4),
        )
        .await;

    assert_eq!(pipeline.stock(product_id).await, 2);
    let letters = pipeline.dead_letters.entries().await;
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].body, pipeline.order(product_id, 3));
    assert!(letters[0].reason.contains("insufficient_stock"));
    assert_eq!(ledger.acked_count().await, 1);
}

#[tokio::test]
async fn test_message_requeued_while_draining_is_redelivered() {
    let pipeline = Pipeline::new(Arc::new(InMemoryProductRepository::new())).await;
    let product_id = pipeline.add_product(0).await;
    let dead_letters = Arc::new(FlakyDeadLetterQueue::new(1));

    let (publisher, queue) = InMemoryOrderQueue::new();
    let ledger = queue.ledger();
    publish_all(&publisher, vec![pipeline.order(product_id, 1)]).await;
    drop(publisher);

    let consumer = OrderConsumer::new(
        queue,
        Arc::new(OrderValidator::new(pipeline.users.clone(), TIMEOUT)),
        Arc::new(StockReservationEngine::new(
            pipeline.products.clone(),
            ReservationMode::Atomic,
            TIMEOUT,
        )),
        dead_letters.clone(),
        pipeline.logger.clone(),
        fast_settings(4),
    );
    tokio::time::timeout(Duration::from_secs(5), consumer.run())
        .await
        .expect("consumer did not stop")
        .unwrap();

    assert_eq!(ledger.nacked_count().await, 1);
    assert_eq!(ledger.acked_count().await, 1);
    assert_eq!(ledger.unsettled().await, 0);
    assert_eq!(dead_letters.inner.len().await, 1);
    assert_eq!(pipeline.stock(product_id).await, 0);
}

#[tokio::test]
async fn test_unknown_user_is_dropped_and_logged() {
    let pipeline = Pipeline::new(Arc::new(InMemoryProductRepository::new())).await;
    let product_id = pipeline.add_product(5).await;
    let body = OrderMessage::new(product_id.to_string(), 1, UserId::new().to_string())
        .to_vec()
        .unwrap();

    let ledger = pipeline
        .run(vec![body], ReservationMode::Atomic, fast_settings(4))
        .await;

    assert_eq!(pipeline.stock(product_id).await, 5);
    assert_eq!(pipeline.logger.count("dropped"), 1);
    assert!(pipeline.dead_letters.is_empty().await);
    assert_eq!(ledger.acked_count().await, 1);
}

#[tokio::test]
async fn test_malformed_message_does_not_stop_the_consumer() {
    let pipeline = Pipeline::new(Arc::new(InMemoryProductRepository::new())).await;
    let product_id = pipeline.add_product(5).await;
    let non_integer_quantity = format!(
        r#"{{"productID":"{}","quantity":"three","userID":"{}"}}"#,
        product_id,
        pipeline.user.id()
    );

    pipeline
        .run(
            vec![
                b"{not json".to_vec(),
                non_integer_quantity.into_bytes(),
                pipeline.order(product_id, 1),
            ],
            ReservationMode::Atomic,
            fast_settings(4),
        )
        .await;

    assert_eq!(pipeline.stock(product_id).await, 4);
    assert_eq!(pipeline.logger.count("Malformed order message dropped"), 2);
    assert!(pipeline.dead_letters.is_empty().await);
}

#[tokio::test]
async fn test_concurrent_atomic_reservations_never_oversell() {
    let pipeline = Pipeline::new(Arc::new(SlowProductRepository::new(
        Duration::from_millis(5),
    )))
    .await;
    let product_id = pipeline.add_product(1).await;
    let orders = (0..20).map(|_| pipeline.order(product_id, 1)).collect();

    pipeline
        .run(orders, ReservationMode::Atomic, fast_settings(20))
        .await;

    assert_eq!(pipeline.stock(product_id).await, 0);
    assert_eq!(pipeline.logger.count("outcome=reserved"), 1);
    assert_eq!(pipeline.dead_letters.len().await, 19);
}

#[tokio::test]
async fn test_read_then_write_oversells_under_concurrency() {
    let pipeline = Pipeline::new(Arc::new(SlowProductRepository::new(
        Duration::from_millis(20),
    )))
    .await;
    let product_id = pipeline.add_product(1).await;
    let orders = (0..10).map(|_| pipeline.order(product_id, 1)).collect();

    pipeline
        .run(orders, ReservationMode::ReadThenWrite, fast_settings(10))
        .await;

    // 同じ在庫数を読んだ複数のタスクがそれぞれ成功として書き戻す
    assert!(pipeline.logger.count("outcome=reserved") > 1);
    assert_eq!(pipeline.stock(product_id).await, 0);
}

#[tokio::test]
async fn test_exhausted_stock_rejects_repeatedly() {
    let pipeline = Pipeline::new(Arc::new(InMemoryProductRepository::new())).await;
    let product_id = pipeline.add_product(0).await;

    pipeline
        .run(
            vec![pipeline.order(product_id, 1), pipeline.order(product_id, 1)],
            ReservationMode::Atomic,
            fast_settings(1),
        )
        .await;

    assert_eq!(pipeline.stock(product_id).await, 0);
    assert_eq!(pipeline.dead_letters.len().await, 2);
    assert_eq!(pipeline.logger.count("outcome=insufficient_stock"), 2);
}

#[tokio::test]
async fn test_in_flight_reservations_are_bounded() {
    let slow = Arc::new(SlowProductRepository::new(Duration::from_millis(10)));
    let pipeline = Pipeline::new(slow.clone()).await;
    let product_id = pipeline.add_product(100).await;
    let orders = (0..12).map(|_| pipeline.order(product_id, 1)).collect();

    pipeline
        .run(orders, ReservationMode::Atomic, fast_settings(3))
        .await;

    assert_eq!(pipeline.stock(product_id).await, 88);
    assert!(slow.peak() <= 3, "peak in-flight was {}", slow.peak());
}

#[tokio::test]
async fn test_on_receipt_acknowledges_before_outcome() {
    let pipeline = Pipeline::new(Arc::new(InMemoryProductRepository::new())).await;
    let product_id = pipeline.add_product(0).await;

    let ledger = pipeline
        .run(
            vec![pipeline.order(product_id, 1)],
            ReservationMode::Atomic,
            ConsumerSettings {
                ack_mode: AckMode::OnReceipt,
                ..fast_settings(2)
            },
        )
        .await;

    assert_eq!(ledger.acked_count().await, 1);
    assert!(pipeline.dead_letters.is_empty().await);
    assert_eq!(pipeline.logger.count("outcome=insufficient_stock"), 1);
}

#[tokio::test]
async fn test_broker_failure_is_fatal() {
    let pipeline = Pipeline::new(Arc::new(InMemoryProductRepository::new())).await;

    let result = pipeline
        .consumer(BrokenQueue, ReservationMode::Atomic, fast_settings(2))
        .run()
        .await;

    assert!(matches!(
        result,
        Err(ConsumerError::Queue(QueueError::BrokerUnavailable(_)))
    ));
    assert_eq!(pipeline.logger.count("Order queue failed"), 1);
}

#[tokio::test]
async fn test_pacing_spaces_out_messages() {
    let pipeline = Pipeline::new(Arc::new(InMemoryProductRepository::new())).await;
    let product_id = pipeline.add_product(10).await;
    let started = tokio::time::Instant::now();

    pipeline
        .run(
            vec![pipeline.order(product_id, 1), pipeline.order(product_id, 1)],
            ReservationMode::Atomic,
            ConsumerSettings {
                pacing: Duration::from_millis(30),
                ..fast_settings(2)
            },
        )
        .await;

    assert!(started.elapsed() >= Duration::from_millis(60));
    assert_eq!(pipeline.stock(product_id).await, 8);
}
