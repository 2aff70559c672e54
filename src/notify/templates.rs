// src/notify/templates.rs
//! Draft replies suggested alongside each alert. Humans post them, never the bot.

use std::collections::BTreeSet;

use crate::scoring::PainPoint;

fn template(pp: PainPoint) -> &'static str {
    match pp {
        PainPoint::RateLimit => {
            "Ran into the same wall. The Companies House API caps you at 600 requests per \
             5 minutes and the 429s are easy to miss in batch jobs. I ended up putting a thin \
             layer in front of it with backoff and caching (profiles for a day, financials for \
             a week) and rarely hit the limit now. It's available as a REST API if useful: \
             {api_base_url}. Happy to go into details."
        }
        PainPoint::IxbrlParsing => {
            "iXBRL from Companies House filings is painful: inline contexts and taxonomy \
             lookups make even basic figures fiddly to pull out. I built a parser that reads \
             filings from the document API and returns revenue, assets, EBITDA and friends as \
             clean JSON: {api_base_url}. If you hit a filing it gets wrong, send it my way."
        }
        PainPoint::DirectorNetwork => {
            "With the raw CH data you end up paginating appointments per officer and \
             stitching the graph yourself. I wrapped that in one endpoint that walks \
             company -> officers -> other companies (depth 2) and returns nodes and edges: \
             {api_base_url}. No auth needed to try it."
        }
    }
}

const DEFAULT_TEMPLATE: &str = "I've been building on the Companies House API and put a layer \
     on top that handles caching, rate limits, iXBRL parsing and director networks. Might save \
     you some time: {api_base_url}.";

/// Template for the first matched pain point in key order, else the generic one.
pub fn draft_reply(matched: &BTreeSet<PainPoint>, api_base_url: &str) -> String {
    let tpl = matched
        .first()
        .map(|pp| template(*pp))
        .unwrap_or(DEFAULT_TEMPLATE);
    tpl.replace("{api_base_url}", api_base_url)
}
