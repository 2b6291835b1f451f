use medilink_domain::role::Role;
use medilink_service::{ConversationRequest, Error, SendMessageRequest};

#[tokio::test]
#[ignore = "Requires external Postgres. Set MEDILINK_PG_DSN to run."]
async fn conversations_summaries_and_read_marks() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping conversations_summaries_and_read_marks; set MEDILINK_PG_DSN to run this test."
		);

		return;
	};
	let service = super::build_service(&test_db).await;
	let doctor = super::register(&service, Role::Doctor, "Doctor Kildare").await;
	let patient = super::register(&service, Role::Patient, "Mary Smith").await;
	let other = super::register(&service, Role::Patient, "John Doe").await;

	for (from, to, body) in [
		(&patient, &doctor, "Hello doctor"),
		(&doctor, &patient, "Hello Mary"),
		(&patient, &doctor, "Are results in?"),
		(&other, &doctor, "Question about dosage"),
	] {
		service
			.send_message(from, SendMessageRequest { recipient_id: to.user_id, body: body.to_string() })
			.await
			.expect("Send should succeed.");
	}

	let to_self = service
		.send_message(&patient, SendMessageRequest {
			recipient_id: patient.user_id,
			body: "note to self".to_string(),
		})
		.await
		.expect_err("Self messages are rejected.");

	assert!(matches!(to_self, Error::InvalidRequest { .. }));

	let blank = service
		.send_message(&patient, SendMessageRequest {
			recipient_id: doctor.user_id,
			body: "   ".to_string(),
		})
		.await
		.expect_err("Blank messages are rejected.");

	assert!(matches!(blank, Error::InvalidRequest { .. }));

	let conversation = service
		.conversation(&doctor, patient.user_id, ConversationRequest::default())
		.await
		.expect("Conversation should load.");
	let bodies: Vec<&str> = conversation.messages.iter().map(|m| m.body.as_str()).collect();

	assert_eq!(bodies, vec!["Hello doctor", "Hello Mary", "Are results in?"]);

	let summaries = service.list_conversations(&doctor).await.expect("Summaries should load.");

	assert_eq!(summaries.len(), 2);
	assert_eq!(summaries[0].peer_id, other.user_id, "Most recent conversation first.");
	assert_eq!(summaries[0].unread, 1);
	assert_eq!(summaries[1].peer_id, patient.user_id);
	assert_eq!(summaries[1].unread, 2);
	assert_eq!(summaries[1].last_message, "Are results in?");
	assert_eq!(summaries[1].peer_role, Some(Role::Patient));

	let marked = service
		.mark_conversation_read(&doctor, patient.user_id)
		.await
		.expect("Mark read should succeed.");

	assert_eq!(marked.marked, 2);

	let summaries = service.list_conversations(&doctor).await.expect("Summaries should load.");

	assert_eq!(summaries[1].unread, 0);

	let patient_side = service.list_conversations(&patient).await.expect("Summaries should load.");

	assert_eq!(patient_side.len(), 1);
	assert_eq!(patient_side[0].unread, 1, "Doctor's reply is still unread for the patient.");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
