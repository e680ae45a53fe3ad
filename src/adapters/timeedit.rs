//! TimeEdit SOAP client.
//!
//! Requests are plain SOAP 1.1 envelopes posted with reqwest; responses are
//! read with roxmltree by local element name, so namespace prefixes do not
//! matter.

use super::SourceAdapter;
use crate::config::TimeEditConfig;
use crate::error::{SyncError, SyncResult};
use crate::http_config::HttpConfig;
use crate::models::{SourceRecord, TypedObject};
use crate::translator::FieldManifest;
use crate::utils::circuit_breaker::CircuitBreaker;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use log::{debug, info, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use roxmltree::{Document, Node};
use tokio::sync::OnceCell;

/// Largest page the API hands out.
pub const PAGE_SIZE: usize = 1000;

const TIME_FORMAT: &str = "%Y%m%dT%H%M%S";
const SOAP_NS: &str = "http://www.timeedit.se/te/soap/3";
const RECORD_URL_ARGS: &str = "h=t&sid=4&types=0&fe=0&fr=t&step=0&ef=2&nocache=2";

pub struct TimeEditClient {
    http: Client,
    endpoint: String,
    config: TimeEditConfig,
    application_key: OnceCell<String>,
    breaker: CircuitBreaker,
}

impl TimeEditClient {
    pub fn new(config: TimeEditConfig, http: &HttpConfig) -> SyncResult<Self> {
        let client = http
            .build_client()
            .map_err(|e| SyncError::config(format!("could not build TimeEdit HTTP client: {}", e)))?;
        Ok(Self {
            http: client,
            endpoint: format!("https://cloud.timeedit.net/soap/3/{}", config.id),
            config,
            application_key: OnceCell::new(),
            breaker: CircuitBreaker::new("timeedit", http.breaker_config()),
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = endpoint.trim_end_matches('/').to_string();
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Objects of `kind` whose search fields contain `search`, one page at
    /// `begin`. Used to look up groups before mapping them.
    pub async fn find_objects(
        &self,
        kind: &str,
        count: usize,
        begin: usize,
        search: Option<&str>,
    ) -> SyncResult<Vec<TypedObject>> {
        let body = find_objects_body(
            &self.login().await?,
            kind,
            count.min(PAGE_SIZE),
            begin,
            search,
            &self.config.search_fields,
            &self.config.return_fields,
        );
        let response = self.call(body).await?;
        let mut objects = parse_objects(&response)?;
        for object in &mut objects {
            object.kind = kind.to_string();
        }
        Ok(objects)
    }

    async fn login(&self) -> SyncResult<String> {
        let key = self
            .application_key
            .get_or_try_init(|| async {
                let body = format!("<register><certificate>{}</certificate></register>", escape(&self.config.cert));
                let response = self.call(body).await?;
                let key = parse_application_key(&response)?;
                info!("Registered with TimeEdit instance {}", self.config.id);
                Ok::<_, SyncError>(key)
            })
            .await?;

        Ok(format!(
            "<login><username>{}</username><password>{}</password><applicationkey>{}</applicationkey></login>",
            escape(&self.config.username),
            escape(&self.config.password),
            escape(key)
        ))
    }

    async fn call(&self, body: String) -> SyncResult<String> {
        let envelope = envelope(&body);
        self.breaker
            .execute(|| async move {
                let response = self
                    .http
                    .post(&self.endpoint)
                    .header(CONTENT_TYPE, "text/xml; charset=utf-8")
                    .header("SOAPAction", "\"\"")
                    .body(envelope)
                    .send()
                    .await
                    .map_err(|e| SyncError::source_adapter(format!("request failed: {}", e)))?;

                let status = response.status();
                let text = response
                    .text()
                    .await
                    .map_err(|e| SyncError::source_adapter(format!("could not read response: {}", e)))?;

                if let Some(fault) = parse_fault(&text) {
                    return Err(SyncError::source_adapter(format!("SOAP fault: {}", fault)));
                }
                if !status.is_success() {
                    return Err(SyncError::source_adapter(format!("HTTP {}", status)));
                }
                Ok(text)
            })
            .await
            .map_err(|e| e.flatten(|| SyncError::source_adapter("TimeEdit unavailable, circuit open")))
    }

    async fn count_reservations(&self, source_groups: &[String]) -> SyncResult<usize> {
        let body = find_reservations_body(&self.login().await?, source_groups, None, 1, 0);
        parse_total(&self.call(body).await?, "totalnumberofreservations")
    }
}

#[async_trait]
impl SourceAdapter for TimeEditClient {
    async fn fetch_records(&self, source_groups: &[String], manifest: &FieldManifest) -> SyncResult<Vec<SourceRecord>> {
        // An empty search returns every reservation in the instance
        if source_groups.is_empty() {
            return Ok(Vec::new());
        }

        let total = self.count_reservations(source_groups).await?;
        let mut records = Vec::with_capacity(total);
        let mut begin = 0;
        while begin < total {
            let body = find_reservations_body(&self.login().await?, source_groups, Some(manifest), PAGE_SIZE, begin);
            records.extend(parse_reservations(&self.call(body).await?)?);
            begin += PAGE_SIZE;
        }

        if records.is_empty() {
            warn!("TimeEdit returned 0 reservations for {:?}", source_groups);
        } else {
            debug!("TimeEdit returned {} reservations for {:?}", records.len(), source_groups);
        }
        Ok(records)
    }

    fn record_url(&self, record_id: &str) -> String {
        format!(
            "https://cloud.timeedit.net/{}/web/{}/ri.html?id={}&{}",
            self.config.id, self.config.usergroup, record_id, RECORD_URL_ARGS
        )
    }
}

fn envelope(body: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <soapenv:Envelope xmlns:soapenv=\"http://schemas.xmlsoap.org/soap/envelope/\" xmlns=\"{}\">\
         <soapenv:Body>{}</soapenv:Body></soapenv:Envelope>",
        SOAP_NS, body
    )
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn find_reservations_body(
    login: &str,
    source_groups: &[String],
    manifest: Option<&FieldManifest>,
    count: usize,
    begin: usize,
) -> String {
    let mut body = format!("<findReservations>{}<searchobjects>", login);
    for group in source_groups {
        body.push_str(&format!("<object><extid>{}</extid></object>", escape(group)));
    }
    body.push_str("</searchobjects>");
    body.push_str(&format!(
        "<numberofreservations>{}</numberofreservations><beginindex>{}</beginindex>",
        count, begin
    ));

    if let Some(manifest) = manifest {
        for field in &manifest.record_fields {
            body.push_str(&format!("<returnfields>{}</returnfields>", escape(field)));
        }
        if !manifest.by_kind.is_empty() {
            body.push_str("<returntypes>");
            for (kind, fields) in &manifest.by_kind {
                body.push_str(&format!("<typefield><type>{}</type>", escape(kind)));
                for field in fields {
                    body.push_str(&format!("<field>{}</field>", escape(field)));
                }
                body.push_str("</typefield>");
            }
            body.push_str("</returntypes>");
        }
    }

    body.push_str("</findReservations>");
    body
}

fn find_objects_body(
    login: &str,
    kind: &str,
    count: usize,
    begin: usize,
    search: Option<&str>,
    search_fields: &[String],
    return_fields: &[String],
) -> String {
    let mut body = format!(
        "<findObjects>{}<type>{}</type><numberofobjects>{}</numberofobjects><beginindex>{}</beginindex>",
        login,
        escape(kind),
        count,
        begin
    );
    if let Some(search) = search {
        body.push_str("<generalsearchfields>");
        for field in search_fields {
            body.push_str(&format!("<field>{}</field>", escape(field)));
        }
        body.push_str("</generalsearchfields>");
        body.push_str(&format!("<generalsearchstring>{}</generalsearchstring>", escape(search)));
    }
    for field in return_fields {
        body.push_str(&format!("<returnfields>{}</returnfields>", escape(field)));
    }
    body.push_str("</findObjects>");
    body
}

fn parse(text: &str) -> SyncResult<Document<'_>> {
    Document::parse(text).map_err(|e| SyncError::source_adapter(format!("malformed XML: {}", e)))
}

fn parse_fault(text: &str) -> Option<String> {
    let doc = Document::parse(text).ok()?;
    let fault = doc.descendants().find(|n| n.tag_name().name() == "Fault")?;
    let message = fault
        .descendants()
        .find(|n| n.tag_name().name() == "faultstring")
        .and_then(|n| n.text())
        .unwrap_or("unknown fault");
    Some(message.trim().to_string())
}

fn parse_application_key(text: &str) -> SyncResult<String> {
    let doc = parse(text)?;
    doc.descendants()
        .find(|n| n.tag_name().name() == "applicationkey")
        .and_then(|n| n.text())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| SyncError::source_adapter("register response carried no application key"))
}

fn parse_total(text: &str, element: &str) -> SyncResult<usize> {
    let doc = parse(text)?;
    let value = doc
        .descendants()
        .find(|n| n.tag_name().name() == element)
        .and_then(|n| n.text())
        .ok_or_else(|| SyncError::source_adapter(format!("response carried no {}", element)))?;
    value
        .trim()
        .parse()
        .map_err(|_| SyncError::source_adapter(format!("invalid {}: {}", element, value)))
}

/// Attribute or direct child element, whichever the response uses.
fn value<'a>(node: Node<'a, '_>, name: &str) -> Option<&'a str> {
    node.attribute(name).or_else(|| {
        node.children()
            .find(|c| c.is_element() && c.tag_name().name() == name)
            .and_then(|c| c.text())
            .map(str::trim)
    })
}

fn parse_time(node: Node<'_, '_>, name: &str, id: &str) -> SyncResult<NaiveDateTime> {
    let raw = value(node, name)
        .ok_or_else(|| SyncError::source_adapter(format!("reservation {} has no {}", id, name)))?;
    NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .map_err(|e| SyncError::source_adapter(format!("reservation {} has bad {} '{}': {}", id, name, raw, e)))
}

fn parse_reservations(text: &str) -> SyncResult<Vec<SourceRecord>> {
    let doc = parse(text)?;
    doc.descendants()
        .filter(|n| n.tag_name().name() == "reservation")
        .map(parse_reservation)
        .collect()
}

fn parse_reservation(node: Node<'_, '_>) -> SyncResult<SourceRecord> {
    let id = value(node, "id").ok_or_else(|| SyncError::source_adapter("reservation without id"))?;
    let mut record = SourceRecord::new(
        id,
        parse_time(node, "modified", id)?,
        parse_time(node, "begin", id)?,
        parse_time(node, "end", id)?,
    );

    for attribute in node.attributes() {
        record = record.with_top_level_field(attribute.name(), attribute.value());
    }
    for child in node.children().filter(|c| c.is_element() && c.tag_name().name() != "objects") {
        if child.children().all(|c| !c.is_element()) {
            record = record.with_top_level_field(child.tag_name().name(), child.text().unwrap_or("").trim());
        }
    }

    if let Some(objects) = node.children().find(|c| c.tag_name().name() == "objects") {
        for object in objects.children().filter(|c| c.tag_name().name() == "object") {
            record = record.with_object(parse_object(object));
        }
    }
    Ok(record)
}

fn parse_object(node: Node<'_, '_>) -> TypedObject {
    let mut object = TypedObject::new(value(node, "type").unwrap_or(""), value(node, "extid").unwrap_or(""));
    let fields = node
        .descendants()
        .filter(|n| n.tag_name().name() == "field" && n.parent().map(|p| p.tag_name().name()) == Some("fields"));
    for field in fields {
        // One value per field is all we render
        let first = field
            .children()
            .find(|c| c.tag_name().name() == "value")
            .and_then(|c| c.text())
            .map(str::trim);
        if let (Some(name), Some(first)) = (value(field, "extid"), first) {
            object = object.with_field(name, first);
        }
    }
    object
}

fn parse_objects(text: &str) -> SyncResult<Vec<TypedObject>> {
    let doc = parse(text)?;
    let objects = match doc.descendants().find(|n| n.tag_name().name() == "objects") {
        Some(objects) => objects,
        None => return Ok(Vec::new()),
    };
    Ok(objects
        .children()
        .filter(|c| c.tag_name().name() == "object")
        .map(parse_object)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESERVATIONS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/">
  <soap:Body>
    <ns2:findReservationsResponse xmlns:ns2="http://www.timeedit.se/te/soap/3">
      <ns2:totalnumberofreservations>1</ns2:totalnumberofreservations>
      <ns2:reservations>
        <ns2:reservation id="r1">
          <ns2:begin>20220325T080000</ns2:begin>
          <ns2:end>20220325T100000</ns2:end>
          <ns2:length>2:00</ns2:length>
          <ns2:modified>20220320T120000</ns2:modified>
          <ns2:objects>
            <ns2:object type="person_staff" extid="john">
              <ns2:fields>
                <ns2:field extid="person.fullname"><ns2:value>John Lennon</ns2:value><ns2:value>ignored</ns2:value></ns2:field>
              </ns2:fields>
            </ns2:object>
            <ns2:object type="room" extid="R1">
              <ns2:fields>
                <ns2:field extid="room.name"><ns2:value>Room 1</ns2:value></ns2:field>
              </ns2:fields>
            </ns2:object>
          </ns2:objects>
        </ns2:reservation>
      </ns2:reservations>
    </ns2:findReservationsResponse>
  </soap:Body>
</soap:Envelope>"#;

    fn config() -> TimeEditConfig {
        TimeEditConfig {
            id: "chalmers_test".to_string(),
            cert: "cert".to_string(),
            username: "user".to_string(),
            password: "p<ss".to_string(),
            usergroup: "public".to_string(),
            search_fields: vec!["general.id".to_string()],
            return_fields: vec!["general.title".to_string()],
        }
    }

    #[test]
    fn test_parse_reservations() {
        let records = parse_reservations(RESERVATIONS).unwrap();
        assert_eq!(records.len(), 1);

        let record = &records[0];
        assert_eq!(record.id, "r1");
        assert_eq!(record.start_at.format(TIME_FORMAT).to_string(), "20220325T080000");
        assert_eq!(record.modified.format(TIME_FORMAT).to_string(), "20220320T120000");
        assert_eq!(record.top_level_field("length"), Some("2:00"));

        assert_eq!(record.objects.len(), 2);
        assert_eq!(record.objects[0].kind, "person_staff");
        assert_eq!(record.objects[0].id, "john");
        assert_eq!(record.objects[0].field("person.fullname"), Some("John Lennon"));
        assert_eq!(record.objects[1].field("room.name"), Some("Room 1"));
    }

    #[test]
    fn test_parse_total_and_key() {
        assert_eq!(parse_total(RESERVATIONS, "totalnumberofreservations").unwrap(), 1);
        let register = "<Envelope><Body><registerResponse><applicationkey> abc </applicationkey></registerResponse></Body></Envelope>";
        assert_eq!(parse_application_key(register).unwrap(), "abc");
        assert!(parse_application_key("<Envelope/>").is_err());
    }

    #[test]
    fn test_bad_timestamp_is_source_error() {
        let text = r#"<reservations><reservation id="r1"><begin>tomorrow</begin><end>20220325T100000</end><modified>20220320T120000</modified></reservation></reservations>"#;
        let err = parse_reservations(text).unwrap_err();
        assert!(matches!(err, SyncError::SourceAdapter(_)));
    }

    #[test]
    fn test_parse_fault() {
        let text = "<Envelope><Body><Fault><faultcode>Server</faultcode><faultstring>Invalid login</faultstring></Fault></Body></Envelope>";
        assert_eq!(parse_fault(text), Some("Invalid login".to_string()));
        assert_eq!(parse_fault(RESERVATIONS), None);
    }

    #[test]
    fn test_parse_objects() {
        let text = r#"<findObjectsResponse><objects><object extid="courseevt_A"><fields><field extid="general.title"><value>Databases</value></field></fields></object></objects></findObjectsResponse>"#;
        let objects = parse_objects(text).unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].id, "courseevt_A");
        assert_eq!(objects[0].field("general.title"), Some("Databases"));
        assert!(parse_objects("<findObjectsResponse/>").unwrap().is_empty());
    }

    #[test]
    fn test_reservation_request_lists_groups_and_fields() {
        let mut manifest = FieldManifest::default();
        manifest.by_kind.insert("room".to_string(), vec!["room.name".to_string()]);
        manifest.record_fields.push("comment".to_string());
        let groups = vec!["courseevt_A".to_string(), "a&b".to_string()];

        let body = find_reservations_body("<login/>", &groups, Some(&manifest), PAGE_SIZE, 2000);

        assert!(body.contains("<object><extid>courseevt_A</extid></object>"));
        assert!(body.contains("<extid>a&amp;b</extid>"));
        assert!(body.contains("<typefield><type>room</type><field>room.name</field></typefield>"));
        assert!(body.contains("<returnfields>comment</returnfields><returntypes>"));
        assert!(body.contains("<numberofreservations>1000</numberofreservations><beginindex>2000</beginindex>"));
        assert!(Document::parse(&envelope(&body)).is_ok());
    }

    #[test]
    fn test_objects_request_uses_search_fields() {
        let body = find_objects_body("<login/>", "courseevt", 10, 0, Some("TDA"), &["general.id".to_string()], &[]);
        assert!(body.contains("<generalsearchfields><field>general.id</field></generalsearchfields>"));
        assert!(body.contains("<generalsearchstring>TDA</generalsearchstring>"));
    }

    #[test]
    fn test_record_url() {
        let client = TimeEditClient::new(config(), &HttpConfig::timeedit_soap()).unwrap();
        assert_eq!(
            client.record_url("r1"),
            "https://cloud.timeedit.net/chalmers_test/web/public/ri.html?id=r1&h=t&sid=4&types=0&fe=0&fr=t&step=0&ef=2&nocache=2"
        );
    }

    #[tokio::test]
    async fn test_empty_group_list_makes_no_request() {
        // Nothing listens here; any request would fail
        let client = TimeEditClient::new(config(), &HttpConfig::timeedit_soap())
            .unwrap()
            .with_endpoint("http://127.0.0.1:9");

        let records = client.fetch_records(&[], &FieldManifest::default()).await.unwrap();
        assert!(records.is_empty());
    }
}
