//! Configuration web UI
//!
//! Every route is a plain function of the request and the loop context,
//! so the whole UI is exercised without a network stack. The firmware's
//! HTTP server hands each parsed request to [`handle`] from inside the
//! loop pass and writes back the returned [`Response`].

pub mod pages;
pub mod portal;

use core::fmt::Write;

use heapless::String;
use matrixclock_protocol::http::{url_decode, MAX_ARG_NAME, MAX_ARG_VALUE};
use matrixclock_protocol::{ContentType, Method, Request, Response, StatusCode, TimePayload};

use crate::config::VERSION;
use crate::control::ClockContext;
use crate::time::{split_duration, DateTime};
use crate::traits::{Diagnostics, LinkInfo, RestartReason};

use pages::{page, Escaped};

/// Name of the date-time form field
pub const SET_TIME_ARG: &str = "set-time";

pub const RESTART_TEXT: &str = "Restart!";
pub const RESET_WIFI_TEXT: &str = "Clearing WiFi credentials. You will need to reconfigure AP!";
pub const TIME_SET_TEXT: &str = "Time set!";
pub const TIME_ERROR_TEXT: &str = "Error setting time!";

/// Facts gathered once per loop pass for the handlers
pub struct Snapshot<'a> {
    /// Monotonic milliseconds at the start of the pass
    pub now_ms: u64,
    pub link: &'a LinkInfo,
    pub diagnostics: &'a Diagnostics,
}

/// Route one request
pub fn handle(request: &Request<'_>, ctx: &mut ClockContext, snapshot: &Snapshot<'_>) -> Response {
    match request.path {
        "/" => home(ctx),
        "/info" => info(ctx, snapshot),
        "/getTimedate" => time_json(ctx, snapshot.now_ms),
        "/config" => config_form(ctx, snapshot.now_ms),
        "/configSave" => config_save(request, ctx, snapshot.now_ms),
        "/restart" => {
            ctx.restart = Some(RestartReason::Requested);
            Response::plain(StatusCode::Ok, RESTART_TEXT)
        }
        "/resetWifi" => {
            ctx.wipe_credentials = true;
            Response::plain(StatusCode::Ok, RESET_WIFI_TEXT)
        }
        "/sync" => {
            ctx.clock.request_sync();
            home(ctx)
        }
        _ => not_found(request),
    }
}

fn home(ctx: &ClockContext) -> Response {
    page(|out| {
        pages::start(out, &ctx.config.device_name)?;
        pages::clock_widget(out)?;
        pages::nav(out)?;
        pages::end(out)
    })
}

fn info(ctx: &ClockContext, snapshot: &Snapshot<'_>) -> Response {
    let diag = snapshot.diagnostics;
    let link = snapshot.link;
    let (days, hours, minutes, seconds) = split_duration(snapshot.now_ms / 1000);

    page(|out| {
        pages::start(out, &ctx.config.device_name)?;
        pages::nav(out)?;

        pages::table_start(out, "System")?;
        pages::row(out, "Firmware", VERSION)?;
        pages::row(out, "Platform", diag.platform)?;
        pages::row(out, "Reset reason", diag.reset_reason)?;
        pages::row(out, "Load average", format_args!("{}%", ctx.load.value()))?;
        pages::row(out, "Free memory", format_args!("{} bytes", diag.free_memory))?;
        pages::row(out, "Chip ID", format_args!("0x{:X}", diag.chip_id))?;
        pages::row(out, "Flash size", format_args!("{} bytes", diag.flash_size))?;
        pages::row(out, "Image size", format_args!("{} bytes", diag.image_size))?;
        pages::table_end(out)?;

        pages::table_start(out, "Network")?;
        pages::row(out, "SSID", Escaped(&link.ssid))?;
        pages::row(out, "RSSI", format_args!("{} dBm", link.rssi))?;
        pages::row(
            out,
            "IP address",
            format_args!("{}.{}.{}.{}", link.ip[0], link.ip[1], link.ip[2], link.ip[3]),
        )?;
        pages::row(out, "WiFi downtime", format_args!("{} s", ctx.connectivity.downtime_s()))?;
        pages::table_end(out)?;

        pages::table_start(out, "Uptime")?;
        pages::row(
            out,
            "Running",
            format_args!(
                "{} days {} hours {} minutes {} seconds",
                days, hours, minutes, seconds
            ),
        )?;
        pages::row(out, "Uptime counter", format_args!("{} s", ctx.uptime.seconds()))?;
        pages::table_end(out)?;

        pages::end(out)
    })
    .with_refresh("60")
}

fn time_json(ctx: &ClockContext, now_ms: u64) -> Response {
    let now = ctx.clock.local(now_ms).unwrap_or_else(|| DateTime::from_epoch(0));
    let payload = TimePayload {
        hour: now.hour,
        minute: now.minute,
        second: now.second,
        is_am: now.is_am() as u8,
        day: now.day,
        month: now.month,
        year: now.year.clamp(0, u16::MAX as i32) as u16,
    };
    match payload.to_json() {
        Ok(json) => Response::json(&json),
        Err(_) => Response::plain(StatusCode::BadRequest, "time unavailable"),
    }
}

fn config_form(ctx: &ClockContext, now_ms: u64) -> Response {
    let now = ctx.clock.local(now_ms).unwrap_or_else(|| DateTime::from_epoch(0));
    page(|out| {
        pages::start(out, &ctx.config.device_name)?;
        pages::nav(out)?;
        write!(
            out,
            "<h2>Set time</h2><form action=\"/configSave\" method=\"post\">\
             <label for=\"{arg}\">Date and time</label><br>\
             <input type=\"datetime-local\" id=\"{arg}\" name=\"{arg}\" step=\"1\" \
             value=\"{:04}-{:02}-{:02}T{:02}:{:02}:{:02}\">\
             <button type=\"submit\">Save</button></form>",
            now.year,
            now.month,
            now.day,
            now.hour,
            now.minute,
            now.second,
            arg = SET_TIME_ARG,
        )?;
        pages::end(out)
    })
}

fn config_save(request: &Request<'_>, ctx: &mut ClockContext, now_ms: u64) -> Response {
    let status = match request.arg(SET_TIME_ARG) {
        Some(value) => match DateTime::parse_local(&value) {
            Ok(local) => {
                ctx.clock.set_time(local.to_epoch(), now_ms);
                TIME_SET_TEXT
            }
            Err(_) => TIME_ERROR_TEXT,
        },
        None => "",
    };

    page(|out| {
        pages::start(out, &ctx.config.device_name)?;
        write!(out, "<p>{}<br />Returning to main page...</p>", status)?;
        pages::end(out)
    })
    .with_refresh("3;/")
}

fn not_found(request: &Request<'_>) -> Response {
    let mut response = Response::new(StatusCode::NotFound, ContentType::Plain);
    let method = match request.method {
        Method::Get => "GET",
        _ => "POST",
    };
    let _ = write!(
        response,
        "File Not Found\n\nURI: {}\nMethod: {}\nArguments: {}\n",
        request.path,
        method,
        request.arg_count()
    );
    for (raw_name, raw_value) in request.args() {
        let name: String<MAX_ARG_NAME> = url_decode(raw_name);
        let value: String<MAX_ARG_VALUE> = url_decode(raw_value);
        if write!(response, " {}: {}\n", name, value).is_err() {
            break;
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClockConfig;
    use crate::time::SyncStatus;

    const DIAG: Diagnostics = Diagnostics {
        platform: "test",
        reset_reason: "power-on",
        free_memory: 1234,
        chip_id: 0xE6614103_E7452D2F,
        flash_size: 2 * 1024 * 1024,
        image_size: 300_000,
    };

    fn context() -> ClockContext {
        ClockContext::new(ClockConfig::default())
    }

    fn serve(ctx: &mut ClockContext, raw: &[u8], now_ms: u64) -> Response {
        let link = LinkInfo::default();
        let snapshot = Snapshot {
            now_ms,
            link: &link,
            diagnostics: &DIAG,
        };
        let request = Request::parse(raw).unwrap();
        handle(&request, ctx, &snapshot)
    }

    #[test]
    fn test_time_json() {
        let mut ctx = context();
        let epoch = DateTime::parse_local("2024-03-14T21:05:07").unwrap().to_epoch();
        ctx.clock.set_time(epoch, 0);
        let response = serve(&mut ctx, b"GET /getTimedate HTTP/1.1\r\n\r\n", 0);
        assert_eq!(response.content_type, ContentType::Json);
        assert_eq!(
            response.body(),
            r#"{"hour":21,"minute":5,"second":7,"isAM":0,"day":14,"month":3,"year":2024}"#
        );
    }

    #[test]
    fn test_config_save_sets_time() {
        let mut ctx = context();
        let response = serve(
            &mut ctx,
            b"GET /configSave?set-time=2024-06-01T08%3A30 HTTP/1.1\r\n\r\n",
            5000,
        );
        assert!(response.body().contains("Time set!<br />Returning to main page..."));
        assert_eq!(response.refresh, Some("3;/"));
        assert_eq!(ctx.clock.status(), SyncStatus::Set);
        let now = ctx.clock.local(5000).unwrap();
        assert_eq!((now.year, now.month, now.day), (2024, 6, 1));
        assert_eq!((now.hour, now.minute, now.second), (8, 30, 0));
    }

    #[test]
    fn test_config_save_from_form_body() {
        let mut ctx = context();
        let raw = b"POST /configSave HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 32\r\n\r\nset-time=2025-01-02T03%3A04%3A05";
        let response = serve(&mut ctx, raw, 0);
        assert!(response.body().contains(TIME_SET_TEXT));
        assert_eq!(ctx.clock.local(0).unwrap().second, 5);
    }

    #[test]
    fn test_config_save_rejects_garbage() {
        let mut ctx = context();
        let response = serve(&mut ctx, b"GET /configSave?set-time=tomorrow HTTP/1.1\r\n\r\n", 0);
        assert!(response.body().contains(TIME_ERROR_TEXT));
        assert_eq!(ctx.clock.status(), SyncStatus::NotSet);

        let response = serve(
            &mut ctx,
            b"GET /configSave?set-time=2024-02-30T10%3A00 HTTP/1.1\r\n\r\n",
            0,
        );
        assert!(response.body().contains(TIME_ERROR_TEXT));
        assert!(!ctx.clock.is_set());
    }

    #[test]
    fn test_restart_and_reset_flags() {
        let mut ctx = context();
        let response = serve(&mut ctx, b"GET /restart HTTP/1.1\r\n\r\n", 0);
        assert_eq!(response.body(), "Restart!");
        assert_eq!(response.content_type, ContentType::Plain);
        assert_eq!(ctx.restart, Some(RestartReason::Requested));

        let response = serve(&mut ctx, b"GET /resetWifi HTTP/1.1\r\n\r\n", 0);
        assert_eq!(response.body(), RESET_WIFI_TEXT);
        assert!(ctx.wipe_credentials);
    }

    #[test]
    fn test_sync_requests_resync() {
        let mut ctx = context();
        ctx.clock.set_time(1_700_000_000, 0);
        assert!(!ctx.clock.sync_due(1000));
        let response = serve(&mut ctx, b"GET /sync HTTP/1.1\r\n\r\n", 1000);
        assert!(response.body().contains("/getTimedate"));
        assert!(ctx.clock.sync_due(1000));
    }

    #[test]
    fn test_info_page() {
        let mut ctx = context();
        let response = serve(&mut ctx, b"GET /info HTTP/1.1\r\n\r\n", 90_061_000);
        assert_eq!(response.refresh, Some("60"));
        let body = response.body();
        assert!(body.contains("0xE6614103E7452D2F"));
        assert!(body.contains("1 days 1 hours 1 minutes 1 seconds"));
        assert!(body.contains(VERSION));
        assert!(body.contains("0.0.0.0"));
    }

    #[test]
    fn test_not_found_lists_arguments() {
        let mut ctx = context();
        let response = serve(&mut ctx, b"GET /nope?a=1&b=hello+world HTTP/1.1\r\n\r\n", 0);
        assert_eq!(response.status, StatusCode::NotFound);
        assert_eq!(
            response.body(),
            "File Not Found\n\nURI: /nope\nMethod: GET\nArguments: 2\n a: 1\n b: hello world\n"
        );

        let raw = b"DELETE /x HTTP/1.1\r\n\r\n";
        let response = serve(&mut ctx, raw, 0);
        assert!(response.body().contains("Method: POST\nArguments: 0\n"));
    }

    #[test]
    fn test_home_page() {
        let mut ctx = context();
        let response = serve(&mut ctx, b"GET / HTTP/1.1\r\n\r\n", 0);
        assert_eq!(response.status, StatusCode::Ok);
        assert!(response.body().contains("<title>NTP Clock</title>"));
        assert!(response.body().contains("setInterval(tick,1000)"));
    }
}
