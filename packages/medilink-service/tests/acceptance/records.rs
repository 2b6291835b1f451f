use medilink_domain::role::Role;
use medilink_service::{
	BookRequest, CreateRecordRequest, Error, RecordListRequest, UpdateRecordRequest,
};

fn lab_result(patient_id: Option<uuid::Uuid>) -> CreateRecordRequest {
	CreateRecordRequest {
		patient_id,
		record_type: "lab_result".to_string(),
		title: "Lipid panel".to_string(),
		file_url: "https://files.example.com/lipids.pdf".to_string(),
		notes: None,
		data: Some(serde_json::json!({ "ldl": 96, "hdl": 61 })),
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MEDILINK_PG_DSN to run."]
async fn records_follow_care_relationship_and_soft_delete() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping records_follow_care_relationship_and_soft_delete; set MEDILINK_PG_DSN to run this test."
		);

		return;
	};
	let service = super::build_service(&test_db).await;
	let doctor = super::register(&service, Role::Doctor, "Doctor Grey").await;
	let patient = super::register(&service, Role::Patient, "Izzie Stevens").await;
	let stranger = super::register(&service, Role::Patient, "George Malley").await;
	let own = service.create_record(&patient, lab_result(None)).await.expect("Own record.");

	assert_eq!(own.patient_id, patient.user_id);
	assert_eq!(own.uploaded_by, patient.user_id);

	let denied = service
		.create_record(&doctor, lab_result(Some(patient.user_id)))
		.await
		.expect_err("Doctors need an appointment with the patient.");

	assert!(matches!(denied, Error::Forbidden { .. }));

	let snooping = service
		.get_record(&stranger, own.record_id)
		.await
		.expect_err("Other patients cannot read the record.");

	assert!(matches!(snooping, Error::Forbidden { .. }));

	let date = super::days_ahead(2);

	super::publish(&service, &doctor, date, &["14:00"]).await;
	service
		.book_appointment(
			&patient,
			BookRequest {
				doctor_id: doctor.user_id,
				date: super::date_str(date),
				time: "14:00".to_string(),
				notes: None,
			},
		)
		.await
		.expect("Booking should succeed.");

	let by_doctor = service
		.create_record(&doctor, lab_result(Some(patient.user_id)))
		.await
		.expect("Treating doctor may upload.");

	assert_eq!(by_doctor.uploaded_by, doctor.user_id);

	let updated = service
		.update_record(
			&doctor,
			own.record_id,
			UpdateRecordRequest { title: Some("Lipid panel (fasting)".to_string()), ..Default::default() },
		)
		.await
		.expect("Treating doctor may update.");

	assert_eq!(updated.title, "Lipid panel (fasting)");
	assert_eq!(updated.last_updated_by, Some(doctor.user_id));
	assert_eq!(updated.file_url, own.file_url);

	let listed = service
		.list_records(&doctor, RecordListRequest { patient_id: Some(patient.user_id), record_type: None })
		.await
		.expect("List should succeed.");

	assert_eq!(listed.len(), 2);
	assert_eq!(listed[0].record_id, by_doctor.record_id, "Newest record first.");

	let deleted = service.delete_record(&patient, own.record_id).await.expect("Delete.");

	assert!(deleted.deleted);

	let again = service.delete_record(&patient, own.record_id).await.expect("Repeat delete.");

	assert!(!again.deleted);

	let gone = service.get_record(&patient, own.record_id).await.expect_err("Deleted is hidden.");

	assert!(matches!(gone, Error::NotFound { .. }));

	let edit_deleted = service
		.update_record(&patient, own.record_id, UpdateRecordRequest {
			notes: Some("late note".to_string()),
			..Default::default()
		})
		.await
		.expect_err("Deleted records cannot be edited.");

	assert!(matches!(edit_deleted, Error::NotFound { .. }));

	let remaining = service
		.list_records(&patient, RecordListRequest::default())
		.await
		.expect("List should succeed.");

	assert_eq!(remaining.len(), 1);
	assert_eq!(remaining[0].record_id, by_doctor.record_id);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MEDILINK_PG_DSN to run."]
async fn record_required_fields_are_enforced() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping record_required_fields_are_enforced; set MEDILINK_PG_DSN to run this test.");

		return;
	};
	let service = super::build_service(&test_db).await;
	let patient = super::register(&service, Role::Patient, "Meredith").await;

	for request in [
		CreateRecordRequest { title: "  ".to_string(), ..lab_result(None) },
		CreateRecordRequest { record_type: String::new(), ..lab_result(None) },
		CreateRecordRequest { file_url: "not a url".to_string(), ..lab_result(None) },
	] {
		let err = service.create_record(&patient, request).await.expect_err("Should be rejected.");

		assert!(matches!(err, Error::InvalidRequest { .. }), "Unexpected error: {err:?}");
	}

	let doctor = super::register(&service, Role::Doctor, "Doctor Bailey").await;
	let missing_patient = service
		.create_record(&doctor, lab_result(None))
		.await
		.expect_err("Doctors must name the patient.");

	assert!(matches!(missing_patient, Error::InvalidRequest { .. }));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
