//! Release coordination behavior through the coordinator facade

mod support;

use monero_escrow_common::{Error, XMR_TO_ATOMIC};
use monero_escrow_coordination::{CoordinationState, ParticipantRole, PayoutInstruction};
use support::{Fault, TestFleet};

fn payout() -> PayoutInstruction {
    PayoutInstruction {
        address: "5VendorPayoutAddress11111111111111".to_string(),
        amount: XMR_TO_ATOMIC,
    }
}

#[tokio::test]
async fn release_requires_ready_state() {
    let fleet = TestFleet::new();
    let coordinator = fleet.coordinator();
    fleet.register_all(&coordinator, "escrow_rel_early").await;

    let err = coordinator
        .initiate_release(
            "escrow_rel_early",
            &[ParticipantRole::Buyer, ParticipantRole::Vendor],
            payout(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidState { .. }));
    assert_eq!(fleet.total_calls(), 0);
}

#[tokio::test]
async fn two_of_three_release_submits_and_records_tx() {
    let fleet = TestFleet::new();
    let coordinator = fleet.coordinator();
    fleet.establish(&coordinator, "escrow_rel").await;

    let receipt = coordinator
        .initiate_release(
            "escrow_rel",
            &[ParticipantRole::Buyer, ParticipantRole::Vendor],
            payout(),
        )
        .await
        .unwrap();
    assert_eq!(receipt.tx_id, "cd".repeat(32));

    // Buyer created the spend and broadcast it; vendor co-signed;
    // the arbiter was never involved.
    assert_eq!(fleet.buyer.call_count("transfer"), 1);
    assert_eq!(fleet.buyer.call_count("submit_multisig"), 1);
    assert_eq!(fleet.vendor.call_count("sign_multisig"), 1);
    assert_eq!(fleet.arbiter.call_count("transfer"), 0);
    assert_eq!(fleet.arbiter.call_count("sign_multisig"), 0);
    assert_eq!(fleet.arbiter.call_count("submit_multisig"), 0);

    let snapshot = coordinator.status("escrow_rel").await.unwrap();
    assert_eq!(snapshot.state, CoordinationState::Released);
    assert_eq!(snapshot.release_tx_id.as_deref(), Some(receipt.tx_id.as_str()));
}

#[tokio::test]
async fn one_valid_fragment_of_three_never_submits() {
    let fleet = TestFleet::new();
    let coordinator = fleet.coordinator();
    fleet.establish(&coordinator, "escrow_rel_thresh").await;

    // Buyer's created spend is the only valid fragment: the vendor
    // produces garbage and the arbiter is unreachable.
    fleet.vendor.fail_on("sign_multisig", Fault::Malformed);
    fleet.arbiter.fail_on("sign_multisig", Fault::Unreachable);

    let err = coordinator
        .initiate_release(
            "escrow_rel_thresh",
            &[
                ParticipantRole::Buyer,
                ParticipantRole::Vendor,
                ParticipantRole::Arbiter,
            ],
            payout(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::ThresholdNotMet {
            required: 2,
            collected: 1
        }
    ));

    // Nothing was submitted anywhere, the coordination stays Ready
    for role in ParticipantRole::ALL {
        assert_eq!(fleet.wallet(role).call_count("submit_multisig"), 0);
    }
    let snapshot = coordinator.status("escrow_rel_thresh").await.unwrap();
    assert_eq!(snapshot.state, CoordinationState::Ready);
    assert!(snapshot.release_tx_id.is_none());
}

#[tokio::test]
async fn skipped_signer_is_compensated_by_the_third() {
    let fleet = TestFleet::new();
    let coordinator = fleet.coordinator();
    fleet.establish(&coordinator, "escrow_rel_skip").await;

    // Vendor garbles its fragment, but all three roles are authorized, so
    // buyer + arbiter still reach the threshold.
    fleet.vendor.fail_on("sign_multisig", Fault::Malformed);

    let receipt = coordinator
        .initiate_release(
            "escrow_rel_skip",
            &[
                ParticipantRole::Buyer,
                ParticipantRole::Vendor,
                ParticipantRole::Arbiter,
            ],
            payout(),
        )
        .await
        .unwrap();
    assert!(!receipt.tx_id.is_empty());
    assert_eq!(fleet.arbiter.call_count("sign_multisig"), 1);

    let snapshot = coordinator.status("escrow_rel_skip").await.unwrap();
    assert_eq!(snapshot.state, CoordinationState::Released);
}

#[tokio::test]
async fn too_few_authorized_roles_fail_before_any_network_call() {
    let fleet = TestFleet::new();
    let coordinator = fleet.coordinator();
    fleet.establish(&coordinator, "escrow_rel_arity").await;
    let calls_before = fleet.total_calls();

    for signers in [
        vec![ParticipantRole::Buyer],
        vec![ParticipantRole::Buyer, ParticipantRole::Buyer],
        vec![],
    ] {
        let err = coordinator
            .initiate_release("escrow_rel_arity", &signers, payout())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ThresholdNotMet { .. }));
    }
    assert_eq!(fleet.total_calls(), calls_before);
}

#[tokio::test]
async fn release_is_not_repeatable() {
    let fleet = TestFleet::new();
    let coordinator = fleet.coordinator();
    fleet.establish(&coordinator, "escrow_rel_twice").await;

    coordinator
        .initiate_release(
            "escrow_rel_twice",
            &[ParticipantRole::Buyer, ParticipantRole::Vendor],
            payout(),
        )
        .await
        .unwrap();

    let err = coordinator
        .initiate_release(
            "escrow_rel_twice",
            &[ParticipantRole::Buyer, ParticipantRole::Vendor],
            payout(),
        )
        .await
        .unwrap_err();
    match err {
        Error::InvalidState { actual, .. } => assert_eq!(actual, "released"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn unreachable_creator_surfaces_transport_error() {
    let fleet = TestFleet::new();
    let coordinator = fleet.coordinator();
    fleet.establish(&coordinator, "escrow_rel_down").await;

    fleet.buyer.fail_on("transfer", Fault::Unreachable);
    let err = coordinator
        .initiate_release(
            "escrow_rel_down",
            &[ParticipantRole::Buyer, ParticipantRole::Vendor],
            payout(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RpcUnreachable(_)));

    // Nothing partially applied
    let snapshot = coordinator.status("escrow_rel_down").await.unwrap();
    assert_eq!(snapshot.state, CoordinationState::Ready);
    assert!(snapshot.release_tx_id.is_none());
}

#[tokio::test]
async fn balance_can_still_be_checked_after_release() {
    let fleet = TestFleet::new();
    let coordinator = fleet.coordinator();
    fleet.establish(&coordinator, "escrow_rel_bal").await;

    coordinator
        .initiate_release(
            "escrow_rel_bal",
            &[ParticipantRole::Buyer, ParticipantRole::Vendor],
            payout(),
        )
        .await
        .unwrap();

    // The record is Released; the audit balance query still works
    let report = coordinator.check_balance("escrow_rel_bal").await.unwrap();
    assert_eq!(report.total, 0);
}
