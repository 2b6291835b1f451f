pub fn render_schema() -> String {
	expand_includes(include_str!("../../../sql/init.sql"))
}

fn expand_includes(sql: &str) -> String {
	let mut out = String::new();

	for line in sql.lines() {
		let trimmed = line.trim();

		if let Some(path) = trimmed.strip_prefix("\\ir ") {
			match path.trim() {
				"tables/001_users.sql" =>
					out.push_str(include_str!("../../../sql/tables/001_users.sql")),
				"tables/002_availability_slots.sql" =>
					out.push_str(include_str!("../../../sql/tables/002_availability_slots.sql")),
				"tables/003_appointments.sql" =>
					out.push_str(include_str!("../../../sql/tables/003_appointments.sql")),
				"tables/004_medical_records.sql" =>
					out.push_str(include_str!("../../../sql/tables/004_medical_records.sql")),
				"tables/005_messages.sql" =>
					out.push_str(include_str!("../../../sql/tables/005_messages.sql")),
				"tables/006_notifications.sql" =>
					out.push_str(include_str!("../../../sql/tables/006_notifications.sql")),
				_ => out.push_str(line),
			}
		} else {
			out.push_str(line);
		}

		out.push('\n');
	}

	out
}
