use medilink_domain::role::Role;
use medilink_service::{
	BookRequest, DoctorListRequest, Error, LoginRequest, RegisterRequest, UpdateProfileRequest,
};

#[tokio::test]
#[ignore = "Requires external Postgres. Set MEDILINK_PG_DSN to run."]
async fn register_login_and_me() {
	let Some(test_db) = super::test_db().await else {
		eprintln!("Skipping register_login_and_me; set MEDILINK_PG_DSN to run this test.");

		return;
	};
	let service = super::build_service(&test_db).await;
	let registered = service
		.register(RegisterRequest {
			name: "Grace Hopper".to_string(),
			email: "Grace@Example.com".to_string(),
			password: "compilers-rule".to_string(),
			role: Role::Patient,
			phone: Some("+1 555 0100".to_string()),
			specialization: Some("ignored for patients".to_string()),
		})
		.await
		.expect("Registration should succeed.");

	assert_eq!(registered.user.email.as_deref(), Some("grace@example.com"));
	assert_eq!(registered.user.specialization, None);

	let principal = service.verify_token(&registered.token).expect("Token should verify.");

	assert_eq!(principal.user_id, registered.user.user_id);
	assert_eq!(principal.role, Role::Patient);

	let logged_in = service
		.login(LoginRequest {
			email: "GRACE@example.com".to_string(),
			password: "compilers-rule".to_string(),
		})
		.await
		.expect("Login should succeed.");

	assert_eq!(logged_in.user.user_id, registered.user.user_id);

	let wrong = service
		.login(LoginRequest {
			email: "grace@example.com".to_string(),
			password: "wrong-password".to_string(),
		})
		.await
		.expect_err("Wrong password should fail.");

	assert!(matches!(wrong, Error::Unauthorized { .. }));

	let me = service.me(&principal).await.expect("Me should succeed.");

	assert_eq!(me.name, "Grace Hopper");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MEDILINK_PG_DSN to run."]
async fn duplicate_email_and_short_password_are_rejected() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping duplicate_email_and_short_password_are_rejected; set MEDILINK_PG_DSN to run this test."
		);

		return;
	};
	let service = super::build_service(&test_db).await;

	super::register(&service, Role::Patient, "Ada").await;

	let duplicate = service
		.register(RegisterRequest {
			name: "Another Ada".to_string(),
			email: "ADA@example.com".to_string(),
			password: "long enough password".to_string(),
			role: Role::Patient,
			phone: None,
			specialization: None,
		})
		.await
		.expect_err("Duplicate email should fail.");

	assert!(matches!(duplicate, Error::Conflict { .. }));

	let short = service
		.register(RegisterRequest {
			name: "Bob".to_string(),
			email: "bob@example.com".to_string(),
			password: "short".to_string(),
			role: Role::Patient,
			phone: None,
			specialization: None,
		})
		.await
		.expect_err("Short password should fail.");

	assert!(matches!(short, Error::InvalidRequest { .. }));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MEDILINK_PG_DSN to run."]
async fn doctor_directory_filters_by_specialization() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping doctor_directory_filters_by_specialization; set MEDILINK_PG_DSN to run this test."
		);

		return;
	};
	let service = super::build_service(&test_db).await;
	let doctor = super::register(&service, Role::Doctor, "Doctor House").await;
	let patient = super::register(&service, Role::Patient, "Patient Zero").await;

	service
		.update_profile(
			&doctor,
			UpdateProfileRequest {
				specialization: Some("Diagnostics".to_string()),
				..UpdateProfileRequest::default()
			},
		)
		.await
		.expect("Doctor may set a specialization.");

	let denied = service
		.update_profile(
			&patient,
			UpdateProfileRequest {
				specialization: Some("Surgery".to_string()),
				..UpdateProfileRequest::default()
			},
		)
		.await
		.expect_err("Patients cannot set a specialization.");

	assert!(matches!(denied, Error::Forbidden { .. }));

	let all = service.list_doctors(DoctorListRequest::default()).await.expect("list");
	let diagnostics = service
		.list_doctors(DoctorListRequest { specialization: Some("diagnostics".to_string()) })
		.await
		.expect("list");
	let none = service
		.list_doctors(DoctorListRequest { specialization: Some("Surgery".to_string()) })
		.await
		.expect("list");

	assert_eq!(all.len(), 1);
	assert_eq!(diagnostics.len(), 1);
	assert_eq!(diagnostics[0].user_id, doctor.user_id);
	assert!(none.is_empty());

	let patients = service.list_my_patients(&doctor).await.expect("list");

	assert!(patients.is_empty(), "No appointments yet.");
	assert!(matches!(service.list_my_patients(&patient).await, Err(Error::Forbidden { .. })));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set MEDILINK_PG_DSN to run."]
async fn patient_contact_details_follow_care_relationship() {
	let Some(test_db) = super::test_db().await else {
		eprintln!(
			"Skipping patient_contact_details_follow_care_relationship; set MEDILINK_PG_DSN to run this test."
		);

		return;
	};
	let service = super::build_service(&test_db).await;
	let doctor = super::register(&service, Role::Doctor, "Doctor Ross").await;
	let patient = super::register(&service, Role::Patient, "Rachel Green").await;
	let stranger = super::register(&service, Role::Patient, "Monica Geller").await;

	for viewer in [&patient, &stranger, &doctor] {
		let profile =
			service.get_user(viewer, doctor.user_id).await.expect("Doctor profile should load.");

		assert_eq!(profile.email.as_deref(), Some("doctor.ross@example.com"));
	}

	let own = service.get_user(&patient, patient.user_id).await.expect("Own profile should load.");

	assert_eq!(own.email.as_deref(), Some("rachel.green@example.com"));

	for viewer in [&stranger, &doctor] {
		let profile =
			service.get_user(viewer, patient.user_id).await.expect("Profile should load.");

		assert_eq!(profile.name, "Rachel Green");
		assert_eq!(profile.email, None);
	}

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

	let seen_by_doctor =
		service.get_user(&doctor, patient.user_id).await.expect("Profile should load.");

	assert_eq!(seen_by_doctor.email.as_deref(), Some("rachel.green@example.com"));

	let seen_by_stranger =
		service.get_user(&stranger, patient.user_id).await.expect("Profile should load.");

	assert_eq!(seen_by_stranger.email, None);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
