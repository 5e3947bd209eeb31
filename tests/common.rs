//! Common test utilities and fixtures
//!
//! HTML fixture builders for every site layout, plus helpers for serving them
//! from a local mock server.
// Common test utilities - all must be public

use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);
#[allow(dead_code)]
pub const HTML_UTF8: &str = "text/html; charset=utf-8";

/// 40-hex info hash for fixture `index`.
#[allow(dead_code)]
pub fn hash(index: usize) -> String {
    format!("{:040x}", index + 1)
}

/// Serves `body` as UTF-8 HTML on `GET route`.
#[allow(dead_code)]
pub async fn mount_html(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body.into_bytes(), HTML_UTF8))
        .mount(server)
        .await;
}

/// Serves `status` with an empty body on `GET route`.
#[allow(dead_code)]
pub async fn mount_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

// Bitsearch

#[allow(dead_code)]
pub fn bitsearch_card(index: usize) -> String {
    format!(
        r#"<div class="bg-white rounded-lg shadow-sm border border-gray-200 p-6">
            <h3 class="text-lg font-semibold text-gray-900 line-clamp-2"><a href="/torrent/{i}">Result {i}</a></h3>
            <div>
              <span><i class="fas fa-video"></i><span>Software</span></span>
              <span><i class="fas fa-download"></i><span>{i}.5 GB</span></span>
              <span><i class="fas fa-calendar"></i><span>2024-02-0{d}</span></span>
              <span class="flex text-green-600"><span class="font-medium">{s}</span></span>
              <span class="flex text-red-600"><span class="font-medium">{l}</span></span>
            </div>
            <a href="/download/torrent/{hash}">torrent</a>
            <a href="magnet:?xt=urn:btih:{hash}&dn=Result{i}">magnet</a>
        </div>"#,
        i = index,
        d = index % 9 + 1,
        s = 10 * (index + 1),
        l = index,
        hash = hash(index)
    )
}

#[allow(dead_code)]
pub fn bitsearch_page(count: usize) -> String {
    let cards: Vec<String> = (0..count).map(bitsearch_card).collect();
    format!("<html><body><main>{}</main></body></html>", cards.join("\n"))
}

// Glodls

#[allow(dead_code)]
pub fn glodls_row(index: usize, name: &str) -> String {
    format!(
        r#"<tr class="t-row"><td><img src="cat.png"></td>
        <td><a href="/cat"><img></a><a href="/release-f-{i}.html" title="{name}"><b>{name}</b></a></td>
        <td><a href="/down.php?id={i}"><img></a></td>
        <td><a href="magnet:?xt=urn:btih:{hash}&dn=release"><img></a></td>
        <td>{i} GB</td>
        <td><font color="green"><b>{s}</b></font></td>
        <td><font color="red"><b>{l}</b></font></td>
        <td><a href="/profile/u{i}"><b><font color="blue">user{i}</font></b></a></td></tr>
        <tr class="t-row"><td colspan="8"></td></tr>"#,
        i = index,
        name = name,
        hash = hash(index),
        s = 5 + index,
        l = index
    )
}

#[allow(dead_code)]
pub fn glodls_page(names: &[&str]) -> String {
    let rows: Vec<String> = names
        .iter()
        .enumerate()
        .map(|(i, name)| glodls_row(i, name))
        .collect();
    format!(
        r#"<html><body><table class="ttable_headinner">{}<tr class="t-row"><td colspan="8">end</td></tr></table></body></html>"#,
        rows.join("")
    )
}

// Torlock

#[allow(dead_code)]
pub fn torlock_detail_path(index: usize) -> String {
    format!("/torrent/{}/release-{}.html", index, index)
}

/// A list page whose first five rows are layout rows, as on search pages.
#[allow(dead_code)]
pub fn torlock_page(count: usize) -> String {
    let layout: String = (0..4)
        .map(|i| format!(r#"<tr><td><a href="/layout/{}">Layout</a></td></tr>"#, i))
        .collect();
    let rows: String = (0..count)
        .map(|i| {
            format!(
                r#"<tr><td><a href="{href}"><b>Release {i}</b></a></td><td>1/1/2024</td><td>{i} GB</td><td>{s}</td><td>{i}</td></tr>"#,
                href = torlock_detail_path(i),
                i = i,
                s = 100 - i
            )
        })
        .collect();
    format!(
        r#"<html><body><table><tr><th>Name</th><th>Added</th><th>Size</th><th>Seeds</th><th>Peers</th></tr>{}{}</table></body></html>"#,
        layout, rows
    )
}

#[allow(dead_code)]
pub fn torlock_detail(index: usize) -> String {
    format!(
        r#"<html><body>
            <a href="/cat/software.html">Software</a>
            <a href="/tor/{i}.torrent">Torrent file</a>
            <a href="magnet:?xt=urn:btih:{hash}&dn=release">Magnet</a>
            <img class="img-responsive" src="/posters/{i}.jpg">
        </body></html>"#,
        i = index,
        hash = hash(index)
    )
}

// TorrentDownload

#[allow(dead_code)]
pub fn torrentdownload_page(names: &[&str]) -> String {
    let rows: String = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            format!(
                r#"<tr><td><div class="tt-name"><a href="/{hash}/release-{i}">{name}</a> <span class="smallish">Video » Movies</span></div></td><td>2024-03-01</td><td>{i} GB</td><td>2,{i}00</td><td>{i}</td></tr>"#,
                hash = hash(i).to_uppercase(),
                i = i,
                name = name
            )
        })
        .collect();
    format!(
        r#"<html><body>
        <table class="table2"><tr><td><a href="/fast">Fast</a></td></tr></table>
        <table class="table2"><tr><th>Name</th><th>Age</th><th>Size</th><th>Seeds</th><th>Peers</th></tr>{}</table>
        <div class="search_stat"><span class="active">1</span><a href="/search?q=x&p=2">2</a><a href="/search?q=x&p=7">7</a></div>
        </body></html>"#,
        rows
    )
}
