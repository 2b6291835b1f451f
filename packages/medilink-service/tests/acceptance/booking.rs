use std::sync::Arc;

use medilink_domain::{role::Role, status::AppointmentStatus};
use medilink_service::{
	AppointmentListRequest, BookRequest, Error, NotificationListRequest, StatusChangeRequest,
	UpdateAppointmentRequest,
};

fn book(doctor_id: uuid::Uuid, date: &str, time: &str) -> BookRequest {
	BookRequest { doctor_id, date: date.to_string(), time: time.to_string(), notes: None }
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MEDILINK_PG_DSN to run."]
async fn booking_takes_a_published_slot_and_notifies_doctor() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping booking_takes_a_published_slot_and_notifies_doctor; set MEDILINK_PG_DSN to run this test."
		);

		return;
	};
	let service = super::build_service(&test_db).await;
	let doctor = super::register(&service, Role::Doctor, "Doctor Who").await;
	let patient = super::register(&service, Role::Patient, "Rose Tyler").await;
	let date = super::days_ahead(3);

	super::publish(&service, &doctor, date, &["11:00", "10:00", "10:00"]).await;

	let appointment = service
		.book_appointment(
			&patient,
			BookRequest { notes: Some("  Follow-up  ".to_string()), ..book(doctor.user_id, &super::date_str(date), "10:00") },
		)
		.await
		.expect("Booking should succeed.");

	assert_eq!(appointment.status, AppointmentStatus::Confirmed);
	assert_eq!(appointment.notes, "Follow-up");
	assert_eq!(appointment.time, "10:00");

	let open = service
		.open_slots(doctor.user_id, &super::date_str(date))
		.await
		.expect("Open slots should load.");

	assert_eq!(open.open_slots, vec!["11:00".to_string()]);
	assert_eq!(open.published_count, 2);

	let inbox = service
		.list_notifications(&doctor, NotificationListRequest::default())
		.await
		.expect("Notifications should load.");

	assert_eq!(inbox.notifications.len(), 1);
	assert_eq!(inbox.notifications[0].kind, "appointment_booked");
	assert_eq!(inbox.notifications[0].appointment_id, Some(appointment.appointment_id));
	assert!(inbox.notifications[0].body.contains("Rose Tyler"));

	let patients = service.list_my_patients(&doctor).await.expect("Patients should load.");

	assert_eq!(patients.len(), 1);
	assert_eq!(patients[0].user_id, patient.user_id);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MEDILINK_PG_DSN to run."]
async fn booking_rejects_bad_windows_unpublished_slots_and_clashes() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping booking_rejects_bad_windows_unpublished_slots_and_clashes; set MEDILINK_PG_DSN to run this test."
		);

		return;
	};
	let service = super::build_service(&test_db).await;
	let doctor = super::register(&service, Role::Doctor, "Doctor Strange").await;
	let other_doctor = super::register(&service, Role::Doctor, "Doctor Watson").await;
	let patient = super::register(&service, Role::Patient, "Tony Stark").await;
	let other_patient = super::register(&service, Role::Patient, "Pepper Potts").await;
	let date = super::days_ahead(5);
	let date_str = super::date_str(date);

	super::publish(&service, &doctor, date, &["09:00"]).await;
	super::publish(&service, &other_doctor, date, &["09:00"]).await;

	let past = service
		.book_appointment(&patient, book(doctor.user_id, &super::date_str(super::days_ahead(-1)), "09:00"))
		.await
		.expect_err("Past booking should fail.");

	assert!(matches!(past, Error::InvalidRequest { .. }));

	let far = service
		.book_appointment(&patient, book(doctor.user_id, &super::date_str(super::days_ahead(400)), "09:00"))
		.await
		.expect_err("Booking beyond the horizon should fail.");

	assert!(matches!(far, Error::InvalidRequest { .. }));

	let malformed = service
		.book_appointment(&patient, book(doctor.user_id, &date_str, "9am"))
		.await
		.expect_err("Malformed time should fail.");

	assert!(matches!(malformed, Error::InvalidRequest { .. }));

	let unpublished = service
		.book_appointment(&patient, book(doctor.user_id, &date_str, "13:00"))
		.await
		.expect_err("Unpublished slot should fail.");

	assert!(matches!(unpublished, Error::Conflict { .. }));

	let not_a_doctor = service
		.book_appointment(&patient, book(other_patient.user_id, &date_str, "09:00"))
		.await
		.expect_err("Booking a patient should fail.");

	assert!(matches!(not_a_doctor, Error::NotFound { .. }));

	let doctor_booking = service
		.book_appointment(&doctor, book(other_doctor.user_id, &date_str, "09:00"))
		.await
		.expect_err("Doctors cannot book.");

	assert!(matches!(doctor_booking, Error::Forbidden { .. }));

	service
		.book_appointment(&patient, book(doctor.user_id, &date_str, "09:00"))
		.await
		.expect("First booking should succeed.");

	let doctor_busy = service
		.book_appointment(&other_patient, book(doctor.user_id, &date_str, "09:00"))
		.await
		.expect_err("Doctor double booking should fail.");

	assert!(matches!(doctor_busy, Error::Conflict { .. }));

	let patient_busy = service
		.book_appointment(&patient, book(other_doctor.user_id, &date_str, "09:00"))
		.await
		.expect_err("Patient double booking should fail.");

	assert!(matches!(patient_busy, Error::Conflict { .. }));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MEDILINK_PG_DSN to run."]
async fn concurrent_bookings_have_a_single_winner() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping concurrent_bookings_have_a_single_winner; set MEDILINK_PG_DSN to run this test."
		);

		return;
	};
	let service = Arc::new(super::build_service(&test_db).await);
	let doctor = super::register(&service, Role::Doctor, "Doctor Octopus").await;
	let date = super::days_ahead(2);

	super::publish(&service, &doctor, date, &["15:30"]).await;

	let mut handles = Vec::new();

	for index in 0..6 {
		let patient = super::register(&service, Role::Patient, &format!("Racer {index}")).await;
		let service = service.clone();
		let request = book(doctor.user_id, &super::date_str(date), "15:30");

		handles.push(tokio::spawn(async move { service.book_appointment(&patient, request).await }));
	}

	let mut booked = 0;
	let mut conflicts = 0;

	for handle in handles {
		match handle.await.expect("Booking task panicked.") {
			Ok(_) => booked += 1,
			Err(Error::Conflict { .. }) => conflicts += 1,
			Err(err) => panic!("Unexpected booking error: {err}"),
		}
	}

	assert_eq!(booked, 1);
	assert_eq!(conflicts, 5);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MEDILINK_PG_DSN to run."]
async fn status_changes_follow_the_state_machine() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping status_changes_follow_the_state_machine; set MEDILINK_PG_DSN to run this test."
		);

		return;
	};
	let service = super::build_service(&test_db).await;
	let doctor = super::register(&service, Role::Doctor, "Doctor Zhivago").await;
	let patient = super::register(&service, Role::Patient, "Lara Antipova").await;
	let date = super::days_ahead(4);

	super::publish(&service, &doctor, date, &["08:00", "08:30"]).await;

	let first = service
		.book_appointment(&patient, book(doctor.user_id, &super::date_str(date), "08:00"))
		.await
		.expect("Booking should succeed.");
	let early = service
		.change_appointment_status(
			&doctor,
			first.appointment_id,
			StatusChangeRequest { status: AppointmentStatus::Completed },
		)
		.await
		.expect_err("Completing a future appointment should fail.");

	assert!(matches!(early, Error::Conflict { .. }));

	let by_patient = service
		.change_appointment_status(
			&patient,
			first.appointment_id,
			StatusChangeRequest { status: AppointmentStatus::Completed },
		)
		.await
		.expect_err("Patients cannot complete appointments.");

	assert!(matches!(by_patient, Error::Forbidden { .. }));

	let cancelled = service
		.change_appointment_status(
			&patient,
			first.appointment_id,
			StatusChangeRequest { status: AppointmentStatus::Cancelled },
		)
		.await
		.expect("Cancel should succeed.");

	assert!(cancelled.changed);
	assert_eq!(cancelled.appointment.status, AppointmentStatus::Cancelled);

	let repeat = service
		.change_appointment_status(
			&doctor,
			first.appointment_id,
			StatusChangeRequest { status: AppointmentStatus::Cancelled },
		)
		.await
		.expect("Repeating the current status is a no-op.");

	assert!(!repeat.changed);

	let revive = service
		.change_appointment_status(
			&doctor,
			first.appointment_id,
			StatusChangeRequest { status: AppointmentStatus::Confirmed },
		)
		.await
		.expect_err("Cancelled is terminal.");

	assert!(matches!(revive, Error::Conflict { .. }));

	let edit = service
		.update_appointment(
			&patient,
			first.appointment_id,
			UpdateAppointmentRequest { notes: Some("too late".to_string()), ..Default::default() },
		)
		.await
		.expect_err("Cancelled appointments cannot be edited.");

	assert!(matches!(edit, Error::Conflict { .. }));

	let inbox = service
		.list_notifications(&doctor, NotificationListRequest::default())
		.await
		.expect("Notifications should load.");
	let kinds: Vec<&str> = inbox.notifications.iter().map(|item| item.kind.as_str()).collect();

	assert!(kinds.contains(&"appointment_cancelled"));

	let rebooked = service
		.book_appointment(&patient, book(doctor.user_id, &super::date_str(date), "08:00"))
		.await
		.expect("A cancelled slot can be booked again.");
	let listed = service
		.list_appointments(
			&patient,
			AppointmentListRequest { status: Some("confirmed".to_string()), ..Default::default() },
		)
		.await
		.expect("List should succeed.");

	assert_eq!(listed.appointments.len(), 1);
	assert_eq!(listed.appointments[0].appointment_id, rebooked.appointment_id);

	let outsider = super::register(&service, Role::Patient, "Outsider").await;
	let hidden = service
		.get_appointment(&outsider, rebooked.appointment_id)
		.await
		.expect_err("Non-participants cannot see appointments.");

	assert!(matches!(hidden, Error::NotFound { .. }));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MEDILINK_PG_DSN to run."]
async fn rescheduling_rechecks_the_new_slot() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping rescheduling_rechecks_the_new_slot; set MEDILINK_PG_DSN to run this test.");

		return;
	};
	let service = super::build_service(&test_db).await;
	let doctor = super::register(&service, Role::Doctor, "Doctor Quinn").await;
	let patient = super::register(&service, Role::Patient, "Sully").await;
	let other_patient = super::register(&service, Role::Patient, "Colleen").await;
	let date = super::days_ahead(6);
	let date_str = super::date_str(date);

	super::publish(&service, &doctor, date, &["09:00", "09:30", "10:00"]).await;

	let mine = service
		.book_appointment(&patient, book(doctor.user_id, &date_str, "09:00"))
		.await
		.expect("Booking should succeed.");

	service
		.book_appointment(&other_patient, book(doctor.user_id, &date_str, "10:00"))
		.await
		.expect("Booking should succeed.");

	let taken = service
		.update_appointment(
			&patient,
			mine.appointment_id,
			UpdateAppointmentRequest { time: Some("10:00".to_string()), ..Default::default() },
		)
		.await
		.expect_err("Moving onto a booked slot should fail.");

	assert!(matches!(taken, Error::Conflict { .. }));

	let moved = service
		.update_appointment(
			&patient,
			mine.appointment_id,
			UpdateAppointmentRequest { time: Some("09:30".to_string()), ..Default::default() },
		)
		.await
		.expect("Moving onto an open slot should succeed.");

	assert_eq!(moved.time, "09:30");

	let same_slot = service
		.update_appointment(
			&patient,
			mine.appointment_id,
			UpdateAppointmentRequest { notes: Some("Bring X-rays".to_string()), ..Default::default() },
		)
		.await
		.expect("Editing notes in place should succeed.");

	assert_eq!(same_slot.notes, "Bring X-rays");

	let open = service.open_slots(doctor.user_id, &date_str).await.expect("Open slots should load.");

	assert_eq!(open.open_slots, vec!["09:00".to_string()]);

	let inbox = service
		.list_notifications(&doctor, NotificationListRequest { unread_only: true, limit: None })
		.await
		.expect("Notifications should load.");

	assert!(inbox.notifications.iter().any(|item| item.kind == "appointment_rescheduled"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
