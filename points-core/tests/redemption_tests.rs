//! End-to-end redemption scenarios, including concurrent races

use chrono::{Duration, Utc};
use points_core::{
    storage::Store, types::EntryKind, AdjustPointsRequest, AuthContext, Config, Event, EventId,
    MembershipStatus, NewEvent, PointsCore, RedeemError, RedeemRequest, SubscriptionGrant,
    UserId,
};
use tempfile::TempDir;

fn admin() -> AuthContext {
    AuthContext::admin(UserId::new("admin-1"))
}

fn member(name: &str) -> AuthContext {
    AuthContext::member(UserId::new(name), MembershipStatus::ActiveMember)
}

async fn create_event(core: &PointsCore, points_cost: u64, max_attendees: u32) -> Event {
    core.events()
        .create_event(
            &admin(),
            NewEvent {
                title: "Winemaker Dinner".to_string(),
                description: None,
                location: Some("Main Cellar".to_string()),
                event_date: Utc::now() + Duration::days(7),
                points_cost,
                max_attendees,
            },
        )
        .await
        .unwrap()
}

async fn fund(core: &PointsCore, name: &str, amount: u64) {
    core.ledger()
        .credit(&UserId::new(name), amount, "Monthly subscription", None)
        .await
        .unwrap();
}

async fn redeem(
    core: &PointsCore,
    name: &str,
    event_id: EventId,
) -> Result<points_core::RedemptionReceipt, RedeemError> {
    core.redemption()
        .redeem(&member(name), &RedeemRequest::new(event_id))
        .await
}

/// registrations + holds == current_attendees <= max_attendees
fn assert_capacity_consistent(core: &PointsCore, event_id: &EventId) {
    let event = core.store().event(event_id).unwrap().unwrap();
    let registrations = core.store().registrations_for_event(event_id).unwrap().len();
    let holds = core.store().open_holds(event_id).unwrap();
    assert!(event.current_attendees <= event.max_attendees);
    assert_eq!(registrations + holds, event.current_attendees as usize);
}

#[tokio::test]
async fn test_member_redeems_points_for_event() {
    let core = PointsCore::in_memory(Config::default()).unwrap();
    let user = UserId::new("alice");
    core.membership()
        .record_subscription_payment(
            &user,
            SubscriptionGrant {
                points_per_month: 1_000_000,
                bonus_points: 0,
            },
            "sub_1",
        )
        .await
        .unwrap();
    let event = create_event(&core, 500_000, 10).await;

    let receipt = redeem(&core, "alice", event.id).await.unwrap();
    assert_eq!(receipt.points_spent, 500_000);
    assert_eq!(receipt.new_balance, 500_000);

    let code = receipt.reservation_code.as_str();
    let (prefix, body) = code.split_once('-').unwrap();
    assert_eq!(prefix, "RES");
    assert_eq!(body.len(), 8);
    assert!(body
        .bytes()
        .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));

    let latest = &core.ledger().history(&user, None).unwrap()[0];
    assert_eq!(latest.kind, EntryKind::Spent);
    assert_eq!(latest.amount, -500_000);
    assert_eq!(latest.description, "Event registration: Winemaker Dinner");
    assert_eq!(
        latest.reference_id.as_deref(),
        Some(receipt.registration_id.to_string().as_str())
    );

    let registrations = core.events().my_registrations(&member("alice")).unwrap();
    assert_eq!(registrations.len(), 1);
    assert_eq!(registrations[0].reservation_code, receipt.reservation_code);
    assert_eq!(
        core.capacity()
            .availability(&event.id)
            .unwrap()
            .unwrap()
            .current_attendees,
        1
    );
    assert_capacity_consistent(&core, &event.id);
}

#[tokio::test]
async fn test_full_price_redemption_of_last_seat() {
    let core = PointsCore::in_memory(Config::default()).unwrap();
    let user = UserId::new("dana");
    fund(&core, "dana", 500_000).await;
    let event = create_event(&core, 500_000, 1).await;
    assert_eq!(event.current_attendees, 0);

    let receipt = redeem(&core, "dana", event.id).await.unwrap();
    assert_eq!(receipt.new_balance, 0);
    assert_eq!(receipt.points_spent, 500_000);
    let pattern = regex::Regex::new(r"^RES-[A-Z0-9]{8}$").unwrap();
    assert!(pattern.is_match(receipt.reservation_code.as_str()));
    assert_eq!(core.store().event(&event.id).unwrap().unwrap().current_attendees, 1);

    let err = redeem(&core, "dana", event.id).await.unwrap_err();
    assert!(matches!(err, RedeemError::AlreadyRegistered(_)));
    assert_eq!(core.ledger().get_balance(&user).unwrap(), 0);
    assert_eq!(core.store().event(&event.id).unwrap().unwrap().current_attendees, 1);
    assert_eq!(core.store().registrations_for_event(&event.id).unwrap().len(), 1);
    assert_capacity_consistent(&core, &event.id);
}

#[tokio::test]
async fn test_second_redemption_is_already_registered() {
    let core = PointsCore::in_memory(Config::default()).unwrap();
    fund(&core, "bob", 1_000).await;
    let event = create_event(&core, 100, 10).await;

    redeem(&core, "bob", event.id).await.unwrap();
    let err = redeem(&core, "bob", event.id).await.unwrap_err();

    assert!(matches!(err, RedeemError::AlreadyRegistered(_)));
    assert_eq!(core.ledger().get_balance(&UserId::new("bob")).unwrap(), 900);
    assert_eq!(core.store().event(&event.id).unwrap().unwrap().current_attendees, 1);
}

#[tokio::test]
async fn test_insufficient_points_leaves_state_unchanged() {
    let core = PointsCore::in_memory(Config::default()).unwrap();
    fund(&core, "carol", 99).await;
    let event = create_event(&core, 100, 10).await;

    let err = redeem(&core, "carol", event.id).await.unwrap_err();
    assert!(matches!(
        err,
        RedeemError::InsufficientPoints {
            balance: 99,
            required: 100
        }
    ));

    let user = UserId::new("carol");
    assert_eq!(core.ledger().get_balance(&user).unwrap(), 99);
    assert_eq!(core.ledger().history(&user, None).unwrap().len(), 1);
    assert_eq!(core.store().event(&event.id).unwrap().unwrap().current_attendees, 0);
    assert!(core.store().registration_for(&user, &event.id).unwrap().is_none());
}

#[tokio::test]
async fn test_guest_cannot_redeem() {
    let core = PointsCore::in_memory(Config::default()).unwrap();
    fund(&core, "dave", 1_000).await;
    let event = create_event(&core, 100, 10).await;

    let guest = AuthContext::member(UserId::new("dave"), MembershipStatus::Guest);
    let err = core
        .redemption()
        .redeem(&guest, &RedeemRequest::new(event.id))
        .await
        .unwrap_err();
    assert!(matches!(err, RedeemError::MembershipRequired));
    assert_eq!(core.ledger().get_balance(&UserId::new("dave")).unwrap(), 1_000);
}

#[tokio::test]
async fn test_cancelled_event_not_available() {
    let core = PointsCore::in_memory(Config::default()).unwrap();
    fund(&core, "erin", 1_000).await;
    let event = create_event(&core, 100, 10).await;
    core.events()
        .set_status(&admin(), &event.id, points_core::EventStatus::Cancelled)
        .await
        .unwrap();

    assert!(matches!(
        redeem(&core, "erin", event.id).await,
        Err(RedeemError::EventNotAvailable(_))
    ));
    assert!(matches!(
        redeem(&core, "erin", EventId::new()).await,
        Err(RedeemError::EventNotAvailable(_))
    ));
}

#[tokio::test]
async fn test_admin_correction_is_audited() {
    let core = PointsCore::in_memory(Config::default()).unwrap();
    let user = UserId::new("frank");
    fund(&core, "frank", 200_000).await;

    let response = core
        .admin()
        .adjust(
            &admin(),
            AdjustPointsRequest::new(user.clone(), -50_000, "correction").unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.new_balance, 150_000);

    let entry = &core.ledger().history(&user, None).unwrap()[0];
    assert_eq!(entry.kind, EntryKind::Adjusted);
    assert_eq!(entry.amount, -50_000);
    assert_eq!(entry.description, "Admin adjustment: correction");

    let log = core.admin().recent_actions(&admin(), None).unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].target_user(), Some(&user));
    assert_eq!(log[0].amount, -50_000);
    assert_eq!(log[0].resulting_balance, 150_000);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_slot_race_between_two_members() {
    let core = PointsCore::in_memory(Config::default()).unwrap();
    fund(&core, "u1", 100).await;
    fund(&core, "u2", 100).await;
    let event_id = create_event(&core, 50, 1).await.id;

    let (a, b) = tokio::join!(
        {
            let core = core.clone();
            tokio::spawn(async move { redeem(&core, "u1", event_id).await })
        },
        {
            let core = core.clone();
            tokio::spawn(async move { redeem(&core, "u2", event_id).await })
        }
    );
    let results = [a.unwrap(), b.unwrap()];

    let winners = results.iter().filter(|r| r.is_ok()).count();
    let full = results
        .iter()
        .filter(|r| matches!(r, Err(RedeemError::EventFull(_))))
        .count();
    assert_eq!(winners, 1);
    assert_eq!(full, 1);

    let balances: u64 = ["u1", "u2"]
        .iter()
        .map(|u| core.ledger().get_balance(&UserId::new(*u)).unwrap())
        .sum();
    assert_eq!(balances, 150);
    assert_eq!(core.store().event(&event_id).unwrap().unwrap().current_attendees, 1);
    assert_capacity_consistent(&core, &event_id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_redemptions_never_overdraw() {
    let core = PointsCore::in_memory(Config::default()).unwrap();
    fund(&core, "grace", 100).await;
    let first = create_event(&core, 60, 10).await.id;
    let second = create_event(&core, 60, 10).await.id;

    let (a, b) = tokio::join!(
        {
            let core = core.clone();
            tokio::spawn(async move { redeem(&core, "grace", first).await })
        },
        {
            let core = core.clone();
            tokio::spawn(async move { redeem(&core, "grace", second).await })
        }
    );
    let results = [a.unwrap(), b.unwrap()];

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .any(|r| matches!(r, Err(RedeemError::InsufficientPoints { .. }))));

    let user = UserId::new("grace");
    assert_eq!(core.ledger().get_balance(&user).unwrap(), 40);
    core.ledger().verify_account(&user).unwrap();

    // The losing attempt's slot was given back
    let attendees: u32 = [first, second]
        .iter()
        .map(|id| core.store().event(id).unwrap().unwrap().current_attendees)
        .sum();
    assert_eq!(attendees, 1);
    assert_capacity_consistent(&core, &first);
    assert_capacity_consistent(&core, &second);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_redemption_race_registers_once() {
    let core = PointsCore::in_memory(Config::default()).unwrap();
    fund(&core, "hank", 1_000).await;
    let event_id = create_event(&core, 100, 10).await.id;

    let tasks: Vec<_> = (0..6)
        .map(|_| {
            let core = core.clone();
            tokio::spawn(async move { redeem(&core, "hank", event_id).await })
        })
        .collect();

    let mut succeeded = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(RedeemError::AlreadyRegistered(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    let user = UserId::new("hank");
    assert_eq!(succeeded, 1);
    assert_eq!(core.ledger().get_balance(&user).unwrap(), 900);
    core.ledger().verify_account(&user).unwrap();
    assert_eq!(core.store().event(&event_id).unwrap().unwrap().current_attendees, 1);
    assert_capacity_consistent(&core, &event_id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_oversubscribed_event_fills_exactly() {
    let core = PointsCore::in_memory(Config::default()).unwrap();
    let event_id = create_event(&core, 10, 5).await.id;
    let names: Vec<String> = (0..12).map(|i| format!("member-{}", i)).collect();
    for name in &names {
        fund(&core, name, 10).await;
    }

    let tasks: Vec<_> = names
        .iter()
        .cloned()
        .map(|name| {
            let core = core.clone();
            tokio::spawn(async move { redeem(&core, &name, event_id).await })
        })
        .collect();

    let mut succeeded = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(RedeemError::EventFull(_)) => {}
            Err(e) => panic!("unexpected error: {}", e),
        }
    }

    assert_eq!(succeeded, 5);
    assert_eq!(core.store().event(&event_id).unwrap().unwrap().current_attendees, 5);
    assert_capacity_consistent(&core, &event_id);

    let spent: u64 = names
        .iter()
        .map(|n| 10 - core.ledger().get_balance(&UserId::new(n.as_str())).unwrap())
        .sum();
    assert_eq!(spent, 50);
}

#[tokio::test]
async fn test_redemption_survives_restart() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        data_dir: dir.path().join("points"),
        ..Config::default()
    };
    let user = UserId::new("ivy");

    let (event_id, code) = {
        let core = PointsCore::open(config.clone()).await.unwrap();
        fund(&core, "ivy", 300).await;
        let event = create_event(&core, 120, 2).await;
        let receipt = redeem(&core, "ivy", event.id).await.unwrap();
        core.shutdown().await.unwrap();
        (event.id, receipt.reservation_code)
    };

    let core = PointsCore::open(config).await.unwrap();
    assert_eq!(core.ledger().get_balance(&user).unwrap(), 180);
    core.ledger().verify_account(&user).unwrap();
    assert!(core.store().code_exists(&code).unwrap());
    assert!(matches!(
        redeem(&core, "ivy", event_id).await,
        Err(RedeemError::AlreadyRegistered(_))
    ));
    assert_capacity_consistent(&core, &event_id);
    core.shutdown().await.unwrap();
}
