// file: src/translator/render.rs
use super::compiler::{CompiledTemplate, Selector};
use crate::models::{Category, SinkEventPayload, SourceRecord};

/// Appended to every title we create so our events can be told apart from
/// ones added by hand. Ten zero-width spaces.
pub const TAG_TITLE: &str = "\u{200B}\u{200B}\u{200B}\u{200B}\u{200B}\u{200B}\u{200B}\u{200B}\u{200B}\u{200B}";

/// The sink caps titles at 256 characters; leave room for the tag.
pub const TITLE_MAX_CHARS: usize = 230;

pub fn is_tagged(title: &str) -> bool {
    title.ends_with(TAG_TITLE)
}

/// Renders one source record into a sink event body. Pure: identical inputs
/// give identical payloads.
pub fn render(template: &CompiledTemplate, record: &SourceRecord, record_url: &str) -> SinkEventPayload {
    let title: String = render_category(template, Category::Title, record)
        .chars()
        .take(TITLE_MAX_CHARS)
        .collect();

    let description = format!(
        "{}<br><br><a href=\"{}\">Edit on TimeEdit</a>",
        render_category(template, Category::Description, record),
        record_url
    );

    SinkEventPayload {
        title: title + TAG_TITLE,
        location_name: render_category(template, Category::Location, record),
        description,
        start_at: record.start_at,
        end_at: record.end_at,
    }
}

fn render_category(template: &CompiledTemplate, category: Category, record: &SourceRecord) -> String {
    let selectors = template.selectors(category);
    let mut selected: Vec<&str> = Vec::new();

    // Reservation attributes go first and are not deduplicated among themselves.
    for (name, value) in &record.top_level_fields {
        if selectors.iter().any(|s| s.is_record_level() && &s.field == name) {
            selected.push(value.as_str());
        }
    }

    // Record order decides, not rule order.
    for object in &record.objects {
        for (name, value) in &object.fields {
            let wanted = selectors.iter().any(|s| s.kind == object.kind && &s.field == name);
            if wanted && !selected.contains(&value.as_str()) {
                selected.push(value.as_str());
            }
        }
    }

    selected.join(category.separator())
}

/// Every selector `template` would try for `category`, for debugging output.
pub fn describe(template: &CompiledTemplate, category: Category) -> String {
    template
        .selectors(category)
        .iter()
        .map(|Selector { kind, field }| format!("{}::{}", kind, field))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TemplateRule, TypedObject, RECORD_KIND};
    use crate::translator::compiler::compile_for_group;
    use chrono::{NaiveDate, NaiveDateTime};

    const URL: &str = "https://cloud.timeedit.net/x/web/y/ri.html?id=r1";

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2022, 3, 25).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    fn template(rules: &[(Category, &str, &str)]) -> CompiledTemplate {
        let rules: Vec<TemplateRule> = rules
            .iter()
            .enumerate()
            .map(|(i, (c, k, f))| TemplateRule::new(i as i64, *c, k, f, "G"))
            .collect();
        compile_for_group(&rules, "G").unwrap()
    }

    fn beatles_record() -> SourceRecord {
        SourceRecord::new("r1", at(7), at(8), at(10))
            .with_object(TypedObject::new("person", "john").with_field("firstname", "john").with_field("lastname", "lennon"))
            .with_object(TypedObject::new("room", "R1").with_field("name", "Room 1"))
            .with_object(TypedObject::new("date", "2022-03-24").with_field("weekday", "Monday"))
    }

    #[test]
    fn test_concrete_scenario() {
        let t = template(&[
            (Category::Title, "person", "firstname"),
            (Category::Location, "room", "name"),
            (Category::Description, "date", "weekday"),
        ]);

        let payload = render(&t, &beatles_record(), URL);

        assert_eq!(payload.title, format!("john{}", TAG_TITLE));
        assert_eq!(payload.location_name, "Room 1");
        assert_eq!(
            payload.description,
            format!("Monday<br><br><a href=\"{}\">Edit on TimeEdit</a>", URL)
        );
        assert_eq!(payload.start_at, at(8));
        assert_eq!(payload.end_at, at(10));
    }

    #[test]
    fn test_values_follow_record_order_and_dedup() {
        let t = template(&[
            (Category::Title, "room", "name"),
            (Category::Title, "person", "firstname"),
            (Category::Location, "room", "name"),
            (Category::Description, "date", "weekday"),
        ]);
        let record = beatles_record()
            .with_object(TypedObject::new("person", "paul").with_field("firstname", "paul"))
            .with_object(TypedObject::new("person", "john2").with_field("firstname", "john"));

        let payload = render(&t, &record, URL);

        // person comes before room in the record, duplicates collapse
        assert_eq!(payload.title, format!("john - Room 1 - paul{}", TAG_TITLE));
    }

    #[test]
    fn test_fields_within_object_follow_record_order() {
        let t = template(&[
            (Category::Title, "person", "lastname"),
            (Category::Title, "person", "firstname"),
            (Category::Location, "room", "name"),
            (Category::Description, "date", "weekday"),
        ]);

        let payload = render(&t, &beatles_record(), URL);

        assert_eq!(payload.title, format!("john - lennon{}", TAG_TITLE));
    }

    #[test]
    fn test_record_level_fields_follow_record_order() {
        let t = template(&[
            (Category::Title, RECORD_KIND, "length"),
            (Category::Title, RECORD_KIND, "comment"),
            (Category::Location, "room", "name"),
            (Category::Description, "date", "weekday"),
        ]);
        let record = beatles_record()
            .with_top_level_field("comment", "Exam")
            .with_top_level_field("length", "2:00");

        let payload = render(&t, &record, URL);

        assert_eq!(payload.title, format!("Exam - 2:00{}", TAG_TITLE));
    }

    #[test]
    fn test_record_level_fields_come_first() {
        let t = template(&[
            (Category::Title, "person", "firstname"),
            (Category::Title, RECORD_KIND, "comment"),
            (Category::Location, "room", "name"),
            (Category::Description, RECORD_KIND, "length"),
            (Category::Description, "date", "weekday"),
        ]);
        let record = beatles_record()
            .with_top_level_field("comment", "Exam")
            .with_top_level_field("length", "2:00");

        let payload = render(&t, &record, URL);

        assert_eq!(payload.title, format!("Exam - john{}", TAG_TITLE));
        assert!(payload.description.starts_with("2:00<br>Monday<br><br>"));
    }

    #[test]
    fn test_missing_fields_render_empty() {
        let t = template(&[
            (Category::Title, "course", "code"),
            (Category::Location, "room", "name"),
            (Category::Description, "staff", "name"),
        ]);
        let record = SourceRecord::new("r2", at(7), at(8), at(9));

        let payload = render(&t, &record, URL);
        assert_eq!(payload.title, TAG_TITLE);
        assert_eq!(payload.location_name, "");
        assert!(payload.description.starts_with("<br><br><a"));
    }

    #[test]
    fn test_title_truncated_before_tag() {
        let t = template(&[
            (Category::Title, "activity", "name"),
            (Category::Location, "room", "name"),
            (Category::Description, "date", "weekday"),
        ]);
        let long = "å".repeat(300);
        let record = beatles_record().with_object(TypedObject::new("activity", "a").with_field("name", &long));

        let payload = render(&t, &record, URL);

        assert!(is_tagged(&payload.title));
        let visible = payload.title.trim_end_matches('\u{200B}');
        assert_eq!(visible.chars().count(), TITLE_MAX_CHARS);
    }

    #[test]
    fn test_render_is_deterministic() {
        let t = template(&[
            (Category::Title, "person", "firstname"),
            (Category::Title, "person", "lastname"),
            (Category::Location, "room", "name"),
            (Category::Description, "date", "weekday"),
        ]);
        let record = beatles_record();

        let first = serde_json::to_vec(&render(&t, &record, URL)).unwrap();
        let second = serde_json::to_vec(&render(&t, &record, URL)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_describe_lists_selectors() {
        let t = template(&[
            (Category::Title, "person", "firstname"),
            (Category::Title, "room", "name"),
            (Category::Location, "room", "name"),
            (Category::Description, "date", "weekday"),
        ]);
        assert_eq!(describe(&t, Category::Title), "person::firstname, room::name");
    }
}
