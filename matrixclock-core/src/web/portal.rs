//! Provisioning portal pages
//!
//! Served on the open access point while the clock has no working
//! credentials. Every path shows the credential form so that the
//! connectivity checks of any OS land on it; `/save` accepts the submission.

use core::fmt::Write;

use matrixclock_protocol::{Request, Response};

use crate::net::WifiCredentials;

use super::pages::{self, page, Escaped};

/// Path the credential form posts to
pub const SAVE_PATH: &str = "/save";

/// Outcome of one portal request
#[derive(Debug)]
pub enum PortalReply {
    /// Show this page and keep the portal open
    Page(Response),
    /// Credentials accepted; send the page, persist them and restart
    Saved {
        response: Response,
        credentials: WifiCredentials,
    },
}

/// Handle a request on the provisioning access point
pub fn handle(request: &Request<'_>, hostname: &str) -> PortalReply {
    if request.path != SAVE_PATH {
        return PortalReply::Page(form(hostname, None));
    }

    let ssid = request.arg("ssid").unwrap_or_default();
    let password = request.arg("password").unwrap_or_default();
    match WifiCredentials::new(&ssid, &password) {
        Ok(credentials) => {
            let response = page(|out| {
                pages::start(out, hostname)?;
                write!(
                    out,
                    "<p>Credentials saved. Joining <b>{}</b>...</p>",
                    Escaped(&credentials.ssid)
                )?;
                pages::end(out)
            });
            PortalReply::Saved { response, credentials }
        }
        Err(_) => PortalReply::Page(form(
            hostname,
            Some("Invalid network name or password (8 to 63 characters)."),
        )),
    }
}

fn form(hostname: &str, error: Option<&str>) -> Response {
    page(|out| {
        pages::start(out, hostname)?;
        if let Some(error) = error {
            write!(out, "<p><b>{}</b></p>", error)?;
        }
        write!(
            out,
            "<h2>WiFi setup</h2><form action=\"{}\" method=\"post\">\
             <label for=\"ssid\">Network</label><br>\
             <input id=\"ssid\" name=\"ssid\" maxlength=\"32\" required><br>\
             <label for=\"password\">Password</label><br>\
             <input id=\"password\" name=\"password\" type=\"password\" maxlength=\"64\"><br>\
             <button type=\"submit\">Save</button></form>",
            SAVE_PATH
        )?;
        pages::end(out)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_path_shows_form() {
        let request = Request::parse(b"GET /generate_204 HTTP/1.1\r\n\r\n").unwrap();
        match handle(&request, "NTP_Clock") {
            PortalReply::Page(response) => {
                assert!(response.body().contains("action=\"/save\""));
                assert!(response.body().contains("<title>NTP_Clock</title>"));
            }
            PortalReply::Saved { .. } => panic!("nothing was submitted"),
        }
    }

    #[test]
    fn test_save_accepts_credentials() {
        let raw = b"POST /save HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\nssid=Home+Net&password=correct%20horse";
        let request = Request::parse(raw).unwrap();
        match handle(&request, "NTP_Clock") {
            PortalReply::Saved { response, credentials } => {
                assert_eq!(credentials.ssid.as_str(), "Home Net");
                assert_eq!(credentials.password.as_str(), "correct horse");
                assert!(response.body().contains("Home Net"));
            }
            PortalReply::Page(_) => panic!("credentials should be accepted"),
        }
    }

    #[test]
    fn test_save_rejects_short_password() {
        let request = Request::parse(b"GET /save?ssid=Home&password=abc HTTP/1.1\r\n\r\n").unwrap();
        match handle(&request, "NTP_Clock") {
            PortalReply::Page(response) => assert!(response.body().contains("Invalid network name")),
            PortalReply::Saved { .. } => panic!("short password accepted"),
        }
    }
}
