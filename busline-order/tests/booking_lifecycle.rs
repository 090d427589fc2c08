use async_trait::async_trait;
use busline_core::booking::{BookingRecord, BookingStatus, CancellationReason, Passenger};
use busline_core::identity::StaticCustomerDirectory;
use busline_core::payment::PaymentSignal;
use busline_core::repository::BookingRepository;
use busline_core::ticketing::TicketDispatcher;
use busline_core::{Clock, CoreError, ManualClock, Money};
use busline_order::{BookingRules, BookingService, ExpirySweeper, ReservationRequest};
use busline_store::memory::{demo_schedule, InMemoryStore, ScheduleSeed};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

const USER: &str = "auth0|traveller-1";

struct ChannelDispatcher {
    sent: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl TicketDispatcher for ChannelDispatcher {
    async fn dispatch_ticket(&self, record: &BookingRecord) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.sent.send(record.booking.pnr.clone())?;
        Ok(())
    }
}

struct BrokenDispatcher;

#[async_trait]
impl TicketDispatcher for BrokenDispatcher {
    async fn dispatch_ticket(&self, _record: &BookingRecord) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        Err("smtp relay unreachable".into())
    }
}

struct Harness {
    store: Arc<InMemoryStore>,
    clock: Arc<ManualClock>,
    service: Arc<BookingService>,
    sweeper: ExpirySweeper,
    seed: ScheduleSeed,
    tickets: mpsc::UnboundedReceiver<String>,
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 14, 8, 0, 0).unwrap()
}

fn travel_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 20).unwrap()
}

async fn harness_with(dispatcher: Option<Arc<dyn TicketDispatcher>>) -> Harness {
    let seed = demo_schedule(&[travel_date()]);
    let store = Arc::new(InMemoryStore::new());
    store.add_schedule(seed.clone()).await;

    let clock = Arc::new(ManualClock::new(start()));
    let customers = Arc::new(StaticCustomerDirectory::new().with_customer(USER, Uuid::new_v4()));
    let (tx, rx) = mpsc::unbounded_channel();
    let dispatcher: Arc<dyn TicketDispatcher> = match dispatcher {
        Some(dispatcher) => dispatcher,
        None => Arc::new(ChannelDispatcher { sent: tx }),
    };

    let service = Arc::new(BookingService::new(
        store.clone(),
        store.clone(),
        customers,
        dispatcher,
        clock.clone(),
        BookingRules::default(),
    ));
    let sweeper = ExpirySweeper::new(store.clone(), clock.clone(), 100, std::time::Duration::from_secs(60));

    Harness { store, clock, service, sweeper, seed, tickets: rx }
}

async fn harness() -> Harness {
    harness_with(None).await
}

impl Harness {
    fn request(&self, seats: &[&str]) -> ReservationRequest {
        ReservationRequest {
            schedule_id: self.seed.schedule.id,
            travel_date: travel_date(),
            seat_numbers: seats.iter().map(|s| s.to_string()).collect(),
            passengers: seats
                .iter()
                .enumerate()
                .map(|(i, _)| Passenger { name: format!("Passenger {}", i + 1), age: Some(30), gender: None })
                .collect(),
            boarding_stop_id: self.seed.stops[0].id,
            dropping_stop_id: self.seed.stops[2].id,
        }
    }

    async fn available(&self) -> i32 {
        self.store.available_seats(self.seed.schedule.id, travel_date()).await.unwrap()
    }
}

#[tokio::test]
async fn test_reserve_prices_each_seat_and_holds_ten_minutes() {
    let h = harness().await;

    let confirmation = h.service.reserve(USER, &h.request(&["A1", "P2"])).await.unwrap();

    // 126.00 for a base seater plus 151.20 for a premium one
    assert_eq!(confirmation.total_amount, Money::from_cents(27720));
    assert_eq!(confirmation.seat_numbers, vec!["A1", "P2"]);
    assert_eq!(confirmation.boarding_point, "Bengaluru");
    assert_eq!(confirmation.dropping_point, "Chennai");
    assert_eq!(confirmation.reservation_expiry_time, start() + Duration::minutes(10));
    assert_eq!(confirmation.pnr.len(), 8);
    assert_eq!(h.available().await, 8);

    let record = h.service.get_booking(confirmation.booking_id).await.unwrap();
    assert_eq!(record.booking.status, BookingStatus::Pending);
    assert_eq!(record.segments.len(), 1);
    assert_eq!(record.segments[0].seats_booked, 2);
    assert_eq!(record.segments[0].amount, confirmation.total_amount);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_for_one_seat_have_one_winner() {
    let h = harness().await;

    let attempts: Vec<_> = (0..8)
        .map(|_| {
            let service = h.service.clone();
            let request = h.request(&["B3"]);
            tokio::spawn(async move { service.reserve(USER, &request).await })
        })
        .collect();

    let mut won = 0;
    for attempt in attempts {
        match attempt.await.unwrap() {
            Ok(_) => won += 1,
            Err(CoreError::SeatsUnavailable(seats)) => assert_eq!(seats, vec!["B3"]),
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(h.available().await, 9);
}

#[tokio::test]
async fn test_overlapping_request_is_rejected_whole() {
    let h = harness().await;
    h.service.reserve(USER, &h.request(&["A2"])).await.unwrap();

    let err = h.service.reserve(USER, &h.request(&["A1", "A2", "A3"])).await.unwrap_err();
    assert_eq!(err, CoreError::SeatsUnavailable(vec!["A2".to_string()]));
    assert_eq!(h.available().await, 9);
}

#[tokio::test]
async fn test_sweep_after_hold_restores_exactly_its_seats() {
    let h = harness().await;
    let early = h.service.reserve(USER, &h.request(&["A1", "A2"])).await.unwrap();

    h.clock.advance(Duration::minutes(5));
    let later = h.service.reserve(USER, &h.request(&["B1"])).await.unwrap();
    assert_eq!(h.available().await, 7);

    h.clock.set(start() + Duration::minutes(11));
    let report = h.sweeper.sweep_once().await.unwrap();
    assert_eq!(report.expired, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(h.available().await, 9);

    let expired = h.service.get_booking(early.booking_id).await.unwrap();
    assert_eq!(expired.booking.status, BookingStatus::Cancelled);
    assert_eq!(expired.booking.cancellation_reason, Some(CancellationReason::HoldExpired));
    assert_eq!(h.service.get_booking(later.booking_id).await.unwrap().booking.status, BookingStatus::Pending);

    // a second pass finds nothing new to restore
    assert_eq!(h.sweeper.sweep_once().await.unwrap().expired, 0);
    assert_eq!(h.available().await, 9);
}

#[tokio::test]
async fn test_confirm_after_hold_fails_and_leaves_status() {
    let h = harness().await;
    let held = h.service.reserve(USER, &h.request(&["A4"])).await.unwrap();

    h.clock.advance(Duration::minutes(10));
    let err = h.service.confirm(held.booking_id, &PaymentSignal::succeeded("pay_late")).await.unwrap_err();
    assert!(matches!(err, CoreError::BookingExpired(_)));

    let record = h.service.get_booking(held.booking_id).await.unwrap();
    assert_eq!(record.booking.status, BookingStatus::Pending);
    assert!(record.booking.payment_reference.is_none());

    h.sweeper.sweep_once().await.unwrap();
    let err = h.service.confirm(held.booking_id, &PaymentSignal::succeeded("pay_late")).await.unwrap_err();
    assert!(matches!(err, CoreError::BookingExpired(_)));
    assert_eq!(h.available().await, 10);
}

#[tokio::test]
async fn test_double_confirm_is_rejected_without_touching_availability() {
    let mut h = harness().await;
    let held = h.service.reserve(USER, &h.request(&["B2", "B3"])).await.unwrap();

    h.clock.advance(Duration::minutes(4));
    let record = h.service.confirm(held.booking_id, &PaymentSignal::succeeded("pay_1")).await.unwrap();
    assert_eq!(record.booking.status, BookingStatus::Confirmed);
    assert_eq!(h.tickets.recv().await.as_deref(), Some(held.pnr.as_str()));
    assert_eq!(h.available().await, 8);

    let err = h.service.confirm(held.booking_id, &PaymentSignal::succeeded("pay_1")).await.unwrap_err();
    assert_eq!(err, CoreError::BookingAlreadyConfirmed(held.pnr.clone()));
    assert_eq!(h.available().await, 8);

    // confirmed bookings are never swept
    h.clock.advance(Duration::hours(1));
    assert_eq!(h.sweeper.sweep_once().await.unwrap(), Default::default());
    assert!(h.store.expire_booking(held.booking_id, h.clock.now()).await.unwrap().is_none());
    assert_eq!(h.available().await, 8);
}

#[tokio::test]
async fn test_failed_payment_releases_seats() {
    let h = harness().await;
    let held = h.service.reserve(USER, &h.request(&["P1"])).await.unwrap();
    assert_eq!(h.available().await, 9);

    let record = h.service.confirm(held.booking_id, &PaymentSignal::failed("pay_declined")).await.unwrap();
    assert_eq!(record.booking.status, BookingStatus::Cancelled);
    assert_eq!(record.booking.cancellation_reason, Some(CancellationReason::PaymentFailed));
    assert_eq!(h.available().await, 10);

    let err = h.service.confirm(held.booking_id, &PaymentSignal::succeeded("pay_retry")).await.unwrap_err();
    assert!(matches!(err, CoreError::BookingCancelled(_)));

    // the seat can be held again
    h.service.reserve(USER, &h.request(&["P1"])).await.unwrap();
}

#[tokio::test]
async fn test_bad_stop_order_never_reaches_seat_storage() {
    let h = harness().await;

    let mut reversed = h.request(&["A1"]);
    reversed.boarding_stop_id = h.seed.stops[2].id;
    reversed.dropping_stop_id = h.seed.stops[0].id;
    let err = h.service.reserve(USER, &reversed).await.unwrap_err();
    assert!(matches!(err, CoreError::InvalidStopSelection(_)));

    let mut same = h.request(&["A1"]);
    same.dropping_stop_id = same.boarding_stop_id;
    let err = h.service.reserve(USER, &same).await.unwrap_err();
    assert!(matches!(err, CoreError::ValidationError(_)));

    let stats = h.store.stats().await;
    assert_eq!(stats.seat_lookups, 0);
    assert_eq!(stats.commits, 0);
    assert_eq!(h.available().await, 10);
}

#[tokio::test]
async fn test_malformed_requests_are_rejected_before_storage() {
    let h = harness().await;

    let mut mismatch = h.request(&["A1", "A2"]);
    mismatch.passengers.pop();

    let duplicate = h.request(&["A1", "A1"]);

    let mut blank_name = h.request(&["A1"]);
    blank_name.passengers[0].name = "  ".to_string();

    let too_many = h.request(&["A1", "A2", "A3", "A4", "B1", "B2", "B3"]);

    let mut past = h.request(&["A1"]);
    past.travel_date = NaiveDate::from_ymd_opt(2026, 10, 13).unwrap();

    for request in [mismatch, duplicate, blank_name, too_many, past] {
        let err = h.service.reserve(USER, &request).await.unwrap_err();
        assert!(matches!(err, CoreError::ValidationError(_)), "{:?}", err);
    }
    assert_eq!(h.store.stats().await, Default::default());
}

#[tokio::test]
async fn test_unknown_customer_and_booking() {
    let h = harness().await;

    let err = h.service.reserve("auth0|stranger", &h.request(&["A1"])).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    let err = h.service.get_booking(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));

    let err = h.service.confirm(Uuid::new_v4(), &PaymentSignal::succeeded("pay_x")).await.unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn test_dispatch_failure_does_not_fail_confirmation() {
    let h = harness_with(Some(Arc::new(BrokenDispatcher))).await;
    let held = h.service.reserve(USER, &h.request(&["A3"])).await.unwrap();

    let record = h.service.confirm(held.booking_id, &PaymentSignal::succeeded("pay_ok")).await.unwrap();
    assert_eq!(record.booking.status, BookingStatus::Confirmed);
}

#[tokio::test]
async fn test_sweeper_stops_on_shutdown() {
    let h = harness().await;
    h.service.reserve(USER, &h.request(&["A1"])).await.unwrap();
    h.clock.advance(Duration::minutes(15));

    let (stop, shutdown) = tokio::sync::watch::channel(false);
    let store = h.store.clone();
    let worker = tokio::spawn(h.sweeper.run(shutdown));

    // first tick fires immediately
    for _ in 0..50 {
        if store.available_seats(h.seed.schedule.id, travel_date()).await == Some(10) {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(store.available_seats(h.seed.schedule.id, travel_date()).await, Some(10));

    stop.send(true).unwrap();
    tokio::time::timeout(std::time::Duration::from_secs(1), worker).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_sweep_drains_every_page_of_overdue_holds() {
    let h = harness().await;
    for seat in ["A1", "A2", "A3", "A4", "B1"] {
        h.service.reserve(USER, &h.request(&[seat])).await.unwrap();
    }
    assert_eq!(h.available().await, 5);

    h.clock.advance(Duration::minutes(11));
    let sweeper = ExpirySweeper::new(h.store.clone(), h.clock.clone(), 2, std::time::Duration::from_secs(60));
    let report = sweeper.sweep_once().await.unwrap();

    assert_eq!(report.expired, 5);
    assert_eq!(report.skipped, 0);
    assert!(h.store.overdue_pending(h.clock.now(), 10).await.unwrap().is_empty());
    assert_eq!(h.available().await, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_confirm_racing_expiry_settles_on_one_outcome() {
    let mut confirmed = 0;
    let mut expired = 0;

    for _ in 0..50 {
        let h = harness().await;
        let held = h.service.reserve(USER, &h.request(&["A1", "B2"])).await.unwrap();

        // payment arrives just inside the hold while the sweeper already sees it as overdue
        h.clock.set(held.reservation_expiry_time - Duration::milliseconds(1));
        let sweep_clock = Arc::new(ManualClock::new(held.reservation_expiry_time));
        let sweeper = ExpirySweeper::new(h.store.clone(), sweep_clock, 100, std::time::Duration::from_secs(60));

        let service = h.service.clone();
        let booking_id = held.booking_id;
        let paying = tokio::spawn(async move {
            service.confirm(booking_id, &PaymentSignal::succeeded("pay_race")).await
        });
        let sweeping = tokio::spawn(async move { sweeper.sweep_once().await });

        let paid = paying.await.unwrap();
        let report = sweeping.await.unwrap().unwrap();
        let record = h.service.get_booking(held.booking_id).await.unwrap();
        let active = record.seats.iter().filter(|s| s.is_active).count() as i32;

        match paid {
            Ok(_) => {
                confirmed += 1;
                assert_eq!(report.expired, 0);
                assert_eq!(record.booking.status, BookingStatus::Confirmed);
                assert_eq!(active, 2);
            }
            Err(CoreError::BookingExpired(_)) => {
                expired += 1;
                assert_eq!(report.expired, 1);
                assert_eq!(record.booking.status, BookingStatus::Cancelled);
                assert_eq!(record.booking.cancellation_reason, Some(CancellationReason::HoldExpired));
                assert_eq!(active, 0);
            }
            Err(other) => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(h.available().await, h.seed.schedule.total_seats - active);
    }
    assert_eq!(confirmed + expired, 50);
}
