//! Integration tests for the crawler
//!
//! These tests use wiremock to serve region and route pages to the real
//! HTTP fetch session and test the full crawl cycle end-to-end.

use bus_crawler::config::{parse_config, Config};
use bus_crawler::crawler::initialize_and_run;
use bus_crawler::storage::{PriceOrder, RunStatus, SqliteStorage};
use bus_crawler::CrawlerError;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// One departure as it appears on a route page
struct Listing {
    operator: &'static str,
    departure: &'static str,
    rating: Option<&'static str>,
    fare: &'static str,
    seats: Option<&'static str>,
}

fn listing(operator: &'static str, departure: &'static str, fare: &'static str) -> Listing {
    Listing {
        operator,
        departure,
        rating: Some("4.0"),
        fare,
        seats: Some("20 Seats available"),
    }
}

fn route_page(listings: &[Listing]) -> String {
    let mut html = String::from(
        r#"<html><body><div class="button">View Buses</div><ul class="bus-items">"#,
    );

    for item in listings {
        html.push_str("<li>");
        html.push_str(&format!(
            r#"<div class="travels lh-24 f-bold d-color">{}</div>
               <div class="bus-type f-12 m-top-16 l-color evBus">A/C Sleeper (2+1)</div>
               <div class="dp-time f-19 d-color f-bold">{}</div>
               <div class="dur l-color lh-24">06h 00m</div>
               <div class="bp-time f-19 d-color disp-Inline">05:30</div>"#,
            item.operator, item.departure
        ));
        if let Some(rating) = item.rating {
            html.push_str(&format!(r#"<div class="rating-sec lh-24">{}</div>"#, rating));
        }
        html.push_str(&format!(r#"<span class="fare d-block">{}</span>"#, item.fare));
        if let Some(seats) = item.seats {
            html.push_str(&format!(r#"<div class="seat-left m-top-30">{}</div>"#, seats));
        }
        html.push_str("</li>");
    }

    html.push_str("</ul></body></html>");
    html
}

fn region_page(routes: &[(&str, &str)]) -> String {
    let links: String = routes
        .iter()
        .map(|(name, href)| format!(r#"<a class="route" href="{}">{}</a>"#, href, name))
        .collect();
    format!(
        r#"<html><body><div class="route_details">{}</div></body></html>"#,
        links
    )
}

async fn serve(server: &MockServer, at: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Builds a validated configuration the way the binary does
fn create_test_config(regions: &[(&str, String)], db_path: &str) -> Config {
    let mut toml = format!(
        r#"
[crawler]
workers = 1
page-load-timeout-ms = 500
reveal-timeout-ms = 200
settle-ms = 0
settle-timeout-ms = 200
poll-interval-ms = 10
flush-initial-backoff-ms = 10
flush-max-elapsed-ms = 100

[user-agent]
crawler-name = "TestBot"
crawler-version = "1.0.0"
contact-url = "https://example.com/contact"
contact-email = "test@example.com"

[output]
database-path = "{}"
"#,
        db_path.replace('\\', "\\\\")
    );

    for (name, url) in regions {
        toml.push_str(&format!(
            "\n[[region]]\nname = \"{}\"\nentry-url = \"{}\"\n",
            name, url
        ));
    }

    parse_config(&toml).expect("test config should validate")
}

fn db_path(dir: &TempDir) -> String {
    dir.path().join("bus_details.db").to_string_lossy().into_owned()
}

#[tokio::test]
async fn test_goa_crawl_end_to_end() {
    let server = MockServer::start().await;
    let base = server.uri();

    serve(
        &server,
        "/online-booking/ktcl/",
        region_page(&[
            ("Panaji to Margao", "/bus-tickets/panaji-to-margao"),
            ("Mapusa to Panaji", "/bus-tickets/mapusa-to-panaji"),
        ]),
    )
    .await;

    serve(
        &server,
        "/bus-tickets/panaji-to-margao",
        route_page(&[
            listing("KTCL", "06:15", "INR 120"),
            listing("Paulo Travels", "07:00", "INR 1,450"),
            Listing {
                rating: None,
                seats: None,
                ..listing("Kadamba", "08:30", "INR 95")
            },
        ]),
    )
    .await;

    // The second route never shows its reveal control
    serve(
        &server,
        "/bus-tickets/mapusa-to-panaji",
        "<html><body><p>Loading...</p></body></html>".to_string(),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    let config = create_test_config(
        &[("Goa", format!("{}/online-booking/ktcl/", base))],
        &path,
    );

    let report = initialize_and_run(config, "test-hash", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.routes_discovered, 2);
    assert_eq!(report.routes_failed, 1);
    assert_eq!(report.records_written, 3);

    let storage = SqliteStorage::new(Path::new(&path)).unwrap();
    assert_eq!(
        storage.count_listings_by_region().unwrap(),
        vec![("Goa".to_string(), 3)]
    );

    let run = storage.get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.records_written, 3);
    assert_eq!(run.config_hash, "test-hash");

    let listings = storage
        .listings_for_route("Panaji to Margao", PriceOrder::LowToHigh)
        .unwrap();
    assert_eq!(listings.len(), 3);

    // Rating descending, then price ascending; the unrated listing sorts last
    assert_eq!(listings[0].operator, "KTCL");
    assert_eq!(listings[0].fare, 120.0);
    assert_eq!(listings[1].operator, "Paulo Travels");
    assert_eq!(listings[1].fare, 1450.0);
    assert_eq!(listings[2].operator, "Kadamba");
    assert_eq!(listings[2].rating, 0.0);

    assert!(listings.iter().all(|l| l.region == "Goa"));
    assert!(listings
        .iter()
        .all(|l| l.route_link == format!("{}/bus-tickets/panaji-to-margao", base)));
}

#[tokio::test]
async fn test_failed_region_does_not_stop_run() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/online-booking/astc/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    serve(
        &server,
        "/online-booking/ksrtc-kerala/",
        region_page(&[("Kochi to Munnar", "/bus-tickets/kochi-to-munnar")]),
    )
    .await;
    serve(
        &server,
        "/bus-tickets/kochi-to-munnar",
        route_page(&[
            listing("KSRTC", "05:00", "Rs. 250"),
            listing("Kallada", "23:15", "Rs. 899"),
        ]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    let config = create_test_config(
        &[
            ("Assam", format!("{}/online-booking/astc/", base)),
            ("Kerala", format!("{}/online-booking/ksrtc-kerala/", base)),
        ],
        &path,
    );

    let report = initialize_and_run(config, "test-hash", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.regions_total, 2);
    assert_eq!(report.regions_failed, 1);
    assert_eq!(report.regions_crawled, 1);
    assert_eq!(report.records_written, 2);

    let storage = SqliteStorage::new(Path::new(&path)).unwrap();
    assert_eq!(
        storage.count_listings_by_region().unwrap(),
        vec![("Kerala".to_string(), 2)]
    );
}

#[tokio::test]
async fn test_redirected_entry_resolves_relative_routes() {
    let server = MockServer::start().await;
    let base = server.uri();

    Mock::given(method("GET"))
        .and(path("/online-booking/jksrtc"))
        .respond_with(
            ResponseTemplate::new(301)
                .insert_header("location", format!("{}/online-booking/jksrtc/", base).as_str()),
        )
        .mount(&server)
        .await;
    serve(
        &server,
        "/online-booking/jksrtc/",
        region_page(&[("Jammu to Srinagar", "jammu-to-srinagar")]),
    )
    .await;
    serve(
        &server,
        "/online-booking/jksrtc/jammu-to-srinagar",
        route_page(&[listing("JKSRTC", "07:00", "INR 650")]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    let config = create_test_config(
        &[(
            "Jammu and Kashmir",
            format!("{}/online-booking/jksrtc", base),
        )],
        &path,
    );

    let report = initialize_and_run(config, "test-hash", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.routes_discovered, 1);
    assert_eq!(report.routes_failed, 0);
    assert_eq!(report.records_written, 1);

    let storage = SqliteStorage::new(Path::new(&path)).unwrap();
    let listings = storage
        .listings_for_route("Jammu to Srinagar", PriceOrder::LowToHigh)
        .unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(
        listings[0].route_link,
        format!("{}/online-booking/jksrtc/jammu-to-srinagar", base)
    );
    assert_eq!(listings[0].fare, 650.0);
}

#[tokio::test]
async fn test_slow_route_is_bounded_and_skipped() {
    let server = MockServer::start().await;
    let base = server.uri();

    serve(
        &server,
        "/online-booking/hrtc/",
        region_page(&[
            ("Shimla to Manali", "/bus-tickets/shimla-to-manali"),
            ("Delhi to Shimla", "/bus-tickets/delhi-to-shimla"),
        ]),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/bus-tickets/shimla-to-manali"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(route_page(&[listing("HRTC", "09:00", "INR 600")]))
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&server)
        .await;

    serve(
        &server,
        "/bus-tickets/delhi-to-shimla",
        route_page(&[listing("HRTC", "21:30", "INR 780")]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    let config = create_test_config(
        &[("Himachal", format!("{}/online-booking/hrtc/", base))],
        &path,
    );

    let report = initialize_and_run(config, "test-hash", CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.routes_failed, 1);
    assert_eq!(report.records_written, 1);

    let storage = SqliteStorage::new(Path::new(&path)).unwrap();
    let listings = storage
        .listings_for_route("Delhi to Shimla", PriceOrder::LowToHigh)
        .unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].fare, 780.0);
}

#[tokio::test]
async fn test_repeated_runs_are_stamped_separately() {
    let server = MockServer::start().await;
    let base = server.uri();

    serve(
        &server,
        "/online-booking/tsrtc/",
        region_page(&[("Hyderabad to Vijayawada", "/bus-tickets/hyd-to-vja")]),
    )
    .await;
    serve(
        &server,
        "/bus-tickets/hyd-to-vja",
        route_page(&[
            listing("TSRTC", "06:00", "INR 450"),
            listing("Orange Travels", "22:00", "INR 700"),
        ]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    let regions = [("Telangana", format!("{}/online-booking/tsrtc/", base))];

    let first = initialize_and_run(
        create_test_config(&regions, &path),
        "test-hash",
        CancellationToken::new(),
    )
    .await
    .unwrap();
    let second = initialize_and_run(
        create_test_config(&regions, &path),
        "test-hash",
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_ne!(first.run_id, second.run_id);

    let storage = SqliteStorage::new(Path::new(&path)).unwrap();
    assert_eq!(storage.count_runs().unwrap(), 2);
    assert_eq!(storage.count_listings().unwrap(), 4);
    assert_eq!(storage.count_listings_for_run(first.run_id).unwrap(), 2);
    assert_eq!(storage.count_listings_for_run(second.run_id).unwrap(), 2);
    assert_eq!(
        storage.route_names_with_prefix("Hyd").unwrap(),
        vec!["Hyderabad to Vijayawada".to_string()]
    );
}

#[tokio::test]
async fn test_cancelled_before_start_writes_nothing_but_records_run() {
    let server = MockServer::start().await;
    let base = server.uri();

    serve(
        &server,
        "/online-booking/ktcl/",
        region_page(&[("Panaji to Margao", "/bus-tickets/panaji-to-margao")]),
    )
    .await;

    let dir = TempDir::new().unwrap();
    let path = db_path(&dir);
    let config = create_test_config(
        &[("Goa", format!("{}/online-booking/ktcl/", base))],
        &path,
    );

    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = initialize_and_run(config, "test-hash", cancel).await.unwrap();
    assert!(report.cancelled);
    assert_eq!(report.records_written, 0);

    let storage = SqliteStorage::new(Path::new(&path)).unwrap();
    let run = storage.get_run(report.run_id).unwrap();
    assert_eq!(run.status, RunStatus::Interrupted);
    assert_eq!(run.records_written, 0);
}

#[tokio::test]
async fn test_unreachable_storage_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir
        .path()
        .join("missing")
        .join("bus_details.db")
        .to_string_lossy()
        .into_owned();
    let config = create_test_config(
        &[("Goa", "http://127.0.0.1:9/online-booking/ktcl/".to_string())],
        &path,
    );

    let result = initialize_and_run(config, "test-hash", CancellationToken::new()).await;
    assert!(matches!(result, Err(CrawlerError::Storage(_))));
}
