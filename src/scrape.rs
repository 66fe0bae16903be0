use scraper::{Html, Selector};

use crate::error::ScrapeError;
use crate::node::ProxyNode;

const TABLE_MARKER: &str = ".cbi-section-table";
const ROW_MARKER: &str = ".cbi-section-table-row";
const ID_MARKER: &str = ".incon";
const NAME_MARKER: &str = ".alias";

// The attribute really is spelled "setction" in the router firmware's
// markup. Do not correct it, the page carries no other node identifier.
const ID_ATTR: &str = "data-setction";

/// Rebuild the node list from the rendered servers page. Rows missing a
/// required attribute are structural rows of the same table and are
/// skipped without error; a page without the table at all is not the
/// servers page (the router serves its login form once the session has
/// gone stale) and is reported as a parse failure.
pub(crate) fn parse_nodes(html: &str) -> Result<Vec<ProxyNode>, ScrapeError> {
    let doc = Html::parse_document(html);

    let table = Selector::parse(TABLE_MARKER).unwrap();
    if doc.select(&table).next().is_none() {
        return Err(ScrapeError::Parse);
    }

    let row = Selector::parse(ROW_MARKER).unwrap();
    let incon = Selector::parse(ID_MARKER).unwrap();
    let alias = Selector::parse(NAME_MARKER).unwrap();

    let mut nodes = Vec::new();
    for element in doc.select(&row) {
        let Some(host) = element.value().attr("server") else {
            continue;
        };
        let Some(port) = element.value().attr("server_port") else {
            continue;
        };

        let id = element
            .select(&incon)
            .next()
            .and_then(|el| el.value().attr(ID_ATTR))
            .unwrap_or_default();
        if id.is_empty() {
            continue;
        }

        let name = element
            .select(&alias)
            .next()
            .map(|el| el.text().collect::<String>().replace(['\n', ' '], ""))
            .unwrap_or_default();

        nodes.push(ProxyNode {
            id: id.to_string(),
            name,
            host: host.to_string(),
            port: port.to_string(),
            ..ProxyNode::default()
        });
    }
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SERVERS_PAGE: &str = r#"
        <html><body>
        <table class="cbi-section-table">
          <tr class="cbi-section-table-titles"><th>Alias</th><th>Server</th></tr>
          <tr class="cbi-section-table-row" server="1.2.3.4" server_port="8388">
            <td class="incon" data-setction="cfg034a29"></td>
            <td class="alias">
              HK 01
            </td>
          </tr>
          <tr class="cbi-section-table-row" server="5.6.7.8" server_port="443">
            <td class="incon" data-setction="cfg11ff02"></td>
            <td class="alias">JP-02</td>
          </tr>
          <tr class="cbi-section-table-row" server="9.9.9.9">
            <td class="incon" data-setction="cfg77aa31"></td>
            <td class="alias">broken, no port</td>
          </tr>
        </table>
        </body></html>"#;

    #[test]
    fn keeps_only_rows_with_required_attributes() {
        let nodes = parse_nodes(SERVERS_PAGE).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].id, "cfg034a29");
        assert_eq!(nodes[0].host, "1.2.3.4");
        assert_eq!(nodes[0].port, "8388");
        assert_eq!(nodes[1].id, "cfg11ff02");
    }

    #[test]
    fn strips_whitespace_from_names() {
        let nodes = parse_nodes(SERVERS_PAGE).unwrap();
        assert_eq!(nodes[0].name, "HK01");
        assert_eq!(nodes[1].name, "JP-02");
    }

    #[test]
    fn skips_rows_without_a_node_id() {
        let page = r#"
            <table class="cbi-section-table">
              <tr class="cbi-section-table-row" server="1.1.1.1" server_port="80">
                <td class="incon"></td><td class="alias">no id attr</td>
              </tr>
              <tr class="cbi-section-table-row" server="2.2.2.2" server_port="80">
                <td class="incon" data-setction=""></td><td class="alias">empty id</td>
              </tr>
            </table>"#;
        assert!(parse_nodes(page).unwrap().is_empty());
    }

    #[test]
    fn missing_name_is_tolerated() {
        let page = r#"
            <table class="cbi-section-table">
              <tr class="cbi-section-table-row" server="1.1.1.1" server_port="80">
                <td class="incon" data-setction="cfg01"></td>
              </tr>
            </table>"#;
        let nodes = parse_nodes(page).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "");
    }

    #[test]
    fn login_page_is_a_parse_failure() {
        let page = r#"<html><body><form class="login"><input name="luci_username"></form></body></html>"#;
        assert!(matches!(parse_nodes(page), Err(ScrapeError::Parse)));
    }

    #[test]
    fn empty_table_yields_an_empty_list() {
        let page = r#"<table class="cbi-section-table"></table>"#;
        assert!(parse_nodes(page).unwrap().is_empty());
    }
}
