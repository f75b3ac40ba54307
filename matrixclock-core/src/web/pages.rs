//! HTML for the configuration UI

use core::fmt::{self, Display, Write};

use matrixclock_protocol::Response;

const STYLE: &str = "body{font-family:sans-serif;background:#10151c;color:#e6e6e6;margin:0 auto;max-width:36em;padding:1em}\
h1{font-size:1.4em}h2{font-size:1.1em;border-bottom:1px solid #345}\
table{border-collapse:collapse;width:100%}th{text-align:left;padding:.2em 1em .2em 0;color:#9ab}\
a.btn,button{display:inline-block;margin:.3em .3em 0 0;padding:.5em 1em;border:0;border-radius:4px;background:#2a6fb0;color:#fff;text-decoration:none;font-size:1em}\
#time{font-size:3em;font-family:monospace}#date{color:#9ab}input{font-size:1em;padding:.3em}";

const CLOCK_SCRIPT: &str = "<script>\
function p(n){return n<10?'0'+n:n}\
function tick(){fetch('/getTimedate').then(function(r){return r.json()}).then(function(t){\
var h=t.hour%12;if(h==0)h=12;\
document.getElementById('time').textContent=h+':'+p(t.minute)+':'+p(t.second)+(t.isAM?' AM':' PM');\
document.getElementById('date').textContent=p(t.day)+'/'+p(t.month)+'/'+t.year;}).catch(function(){})}\
tick();setInterval(tick,1000);\
</script>";

/// HTML-escaped text
pub struct Escaped<'a>(pub &'a str);

impl Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '&' => f.write_str("&amp;")?,
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                '"' => f.write_str("&quot;")?,
                '\'' => f.write_str("&#39;")?,
                c => f.write_char(c)?,
            }
        }
        Ok(())
    }
}

/// Build an HTML page; a body that does not fit is sent truncated
pub fn page<F>(build: F) -> Response
where
    F: FnOnce(&mut Response) -> fmt::Result,
{
    let mut response = Response::html();
    let _ = build(&mut response);
    response
}

pub fn start(out: &mut Response, title: &str) -> fmt::Result {
    write!(
        out,
        "<!DOCTYPE html><html lang=\"en\"><head><meta charset=\"utf-8\">\
         <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\
         <title>{}</title><style>{}</style></head><body><h1>{}</h1>",
        Escaped(title),
        STYLE,
        Escaped(title)
    )
}

pub fn end(out: &mut Response) -> fmt::Result {
    out.write_str("</body></html>")
}

pub fn nav(out: &mut Response) -> fmt::Result {
    out.write_str(
        "<p><a class=\"btn\" href=\"/\">Home</a><a class=\"btn\" href=\"/info\">Info</a>\
         <a class=\"btn\" href=\"/config\">Config</a><a class=\"btn\" href=\"/sync\">Sync</a></p>",
    )
}

pub fn clock_widget(out: &mut Response) -> fmt::Result {
    out.write_str("<div id=\"time\">--:--:--</div><div id=\"date\"></div>")?;
    out.write_str(CLOCK_SCRIPT)
}

pub fn table_start(out: &mut Response, heading: &str) -> fmt::Result {
    write!(out, "<h2>{}</h2><table>", heading)
}

pub fn row(out: &mut Response, name: &str, value: impl Display) -> fmt::Result {
    write!(out, "<tr><th>{}</th><td>{}</td></tr>", name, value)
}

pub fn table_end(out: &mut Response) -> fmt::Result {
    out.write_str("</table>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;

    #[test]
    fn test_escaping() {
        let mut out: String<64> = String::new();
        write!(out, "{}", Escaped("<a href=\"x\">Tom & Jerry's</a>")).unwrap();
        assert_eq!(
            out.as_str(),
            "&lt;a href=&quot;x&quot;&gt;Tom &amp; Jerry&#39;s&lt;/a&gt;"
        );
    }

    #[test]
    fn test_page_frame() {
        let response = page(|out| {
            start(out, "Clock <1>")?;
            end(out)
        });
        assert!(response.body().starts_with("<!DOCTYPE html>"));
        assert!(response.body().contains("<title>Clock &lt;1&gt;</title>"));
        assert!(response.body().ends_with("</body></html>"));
    }
}
