use les_simulator_config::cluster::Conn;
use thiserror::Error;

const ARROW: &str = "->";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyParseError {
    #[error("token '{token}' is not of the form <from>-><to>")]
    MissingArrow { token: String },
    #[error("token '{token}' has an invalid endpoint '{endpoint}'")]
    InvalidEndpoint { token: String, endpoint: String },
    #[error("token '{token}' references index {index} but only {count} are available")]
    IndexOutOfRange {
        token: String,
        index: i64,
        count: usize,
    },
}

/// One side of a link: every node of the role, or a single index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Endpoint {
    All,
    One(usize),
}

#[derive(Debug, PartialEq, Eq)]
enum EndpointError {
    Invalid,
    OutOfRange(i64),
}

fn parse_endpoint(raw: &str, prefixes: [char; 2], count: usize) -> Result<Endpoint, EndpointError> {
    if raw == "*" {
        return Ok(Endpoint::All);
    }
    let digits = raw
        .strip_prefix(prefixes)
        .ok_or(EndpointError::Invalid)?;
    let index = digits
        .parse::<i64>()
        .map_err(|_| EndpointError::Invalid)?;
    match usize::try_from(index) {
        Ok(index) if index < count => Ok(Endpoint::One(index)),
        _ => Err(EndpointError::OutOfRange(index)),
    }
}

fn parse_token(token: &str, clients: usize, servers: usize) -> Result<Vec<Conn>, TopologyParseError> {
    let parts: Vec<&str> = token.split(ARROW).collect();
    let [from, to] = parts.as_slice() else {
        return Err(TopologyParseError::MissingArrow {
            token: token.to_owned(),
        });
    };

    let endpoint_err = |endpoint: &str, count: usize, err: EndpointError| match err {
        EndpointError::Invalid => TopologyParseError::InvalidEndpoint {
            token: token.to_owned(),
            endpoint: endpoint.to_owned(),
        },
        EndpointError::OutOfRange(index) => TopologyParseError::IndexOutOfRange {
            token: token.to_owned(),
            index,
            count,
        },
    };

    let from_endpoint = parse_endpoint(from, ['c', 'C'], clients)
        .map_err(|err| endpoint_err(from, clients, err))?;
    let to_endpoint =
        parse_endpoint(to, ['s', 'S'], servers).map_err(|err| endpoint_err(to, servers, err))?;

    Ok(expand(from_endpoint, to_endpoint, clients, servers))
}

fn expand(from: Endpoint, to: Endpoint, clients: usize, servers: usize) -> Vec<Conn> {
    match (from, to) {
        (Endpoint::One(from), Endpoint::One(to)) => vec![Conn::new(from, to)],
        (Endpoint::All, Endpoint::All) => (0..clients)
            .flat_map(|from| (0..servers).map(move |to| Conn::new(from, to)))
            .collect(),
        (Endpoint::All, Endpoint::One(to)) => (0..clients).map(|from| Conn::new(from, to)).collect(),
        (Endpoint::One(from), Endpoint::All) => (0..servers).map(|to| Conn::new(from, to)).collect(),
    }
}

fn tokens(spec: &str) -> impl Iterator<Item = &str> {
    spec.split(',').map(str::trim).filter(|token| !token.is_empty())
}

/// Compile a topology description such as `"c0->s1, *->s0, c2->*"` into
/// client/server links.
///
/// Tokens that are malformed or reference indices outside
/// `[0, client_count)` / `[0, server_count)` are skipped. Duplicates are kept
/// and order follows the input.
#[must_use]
pub fn parse_topology(spec: &str, client_count: usize, server_count: usize) -> Vec<Conn> {
    tokens(spec)
        .filter_map(|token| parse_token(token, client_count, server_count).ok())
        .flatten()
        .collect()
}

/// Like [`parse_topology`] but fails on the first malformed token.
pub fn parse_topology_strict(
    spec: &str,
    client_count: usize,
    server_count: usize,
) -> Result<Vec<Conn>, TopologyParseError> {
    let mut conns = Vec::new();
    for token in tokens(spec) {
        conns.extend(parse_token(token, client_count, server_count)?);
    }
    Ok(conns)
}

/// Topology parser with a selectable failure mode.
#[derive(Clone, Copy, Debug, Default)]
pub struct TopologyParser {
    pub strict: bool,
}

impl TopologyParser {
    #[must_use]
    pub const fn strict() -> Self {
        Self { strict: true }
    }

    pub fn parse(
        &self,
        spec: &str,
        client_count: usize,
        server_count: usize,
    ) -> Result<Vec<Conn>, TopologyParseError> {
        if self.strict {
            parse_topology_strict(spec, client_count, server_count)
        } else {
            Ok(parse_topology(spec, client_count, server_count))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conns(pairs: &[(usize, usize)]) -> Vec<Conn> {
        pairs.iter().map(|&(from, to)| Conn::new(from, to)).collect()
    }

    #[test]
    fn single_link_is_parsed() {
        assert_eq!(parse_topology("c1->s2", 3, 3), conns(&[(1, 2)]));
    }

    #[test]
    fn links_keep_token_order() {
        assert_eq!(
            parse_topology("c1->s2, c2->s1", 3, 3),
            conns(&[(1, 2), (2, 1)])
        );
    }

    #[test]
    fn parsing_is_deterministic() {
        for spec in ["c1->s2, c2->s1", "*->s2, c1->*", "*->*", "bogus, c0->s0"] {
            assert_eq!(parse_topology(spec, 3, 3), parse_topology(spec, 3, 3), "{spec}");
        }
    }

    #[test]
    fn tokens_missing_a_prefix_yield_nothing() {
        for spec in ["1->2", "c1->2", "1->s2", "s1->c2"] {
            assert!(parse_topology(spec, 3, 3).is_empty(), "{spec}");
        }
    }

    #[test]
    fn wildcards_expand_in_index_order() {
        assert_eq!(
            parse_topology("*->s2, c1->*", 3, 3),
            conns(&[(0, 2), (1, 2), (2, 2), (1, 0), (1, 1), (1, 2)])
        );
    }

    #[test]
    fn double_wildcard_is_client_major() {
        assert_eq!(
            parse_topology("*->*", 2, 3),
            conns(&[(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)])
        );
    }

    #[test]
    fn prefixes_are_case_insensitive() {
        assert_eq!(parse_topology("C0->S1", 1, 2), conns(&[(0, 1)]));
    }

    #[test]
    fn out_of_range_tokens_are_skipped() {
        assert_eq!(
            parse_topology("c5->s0, c0->s0, c0->s-1", 2, 1),
            conns(&[(0, 0)])
        );
    }

    #[test]
    fn empty_tokens_and_whitespace_are_ignored() {
        assert_eq!(parse_topology(" , c0->s0 ,,", 1, 1), conns(&[(0, 0)]));
        assert!(parse_topology("", 4, 4).is_empty());
        assert!(parse_topology(",,,", 4, 4).is_empty());
    }

    #[test]
    fn space_around_arrow_invalidates_token() {
        assert!(parse_topology("c0 -> s0", 1, 1).is_empty());
    }

    #[test]
    fn duplicates_are_preserved() {
        assert_eq!(
            parse_topology("c0->s0,c0->s0", 1, 1),
            conns(&[(0, 0), (0, 0)])
        );
    }

    #[test]
    fn chained_arrows_are_rejected() {
        assert!(parse_topology("c0->s0->s1", 1, 2).is_empty());
    }

    #[test]
    fn wildcard_over_empty_role_yields_nothing() {
        assert!(parse_topology("*->s0", 0, 1).is_empty());
        assert!(parse_topology("*->*", 3, 0).is_empty());
    }

    #[test]
    fn strict_mode_reports_first_bad_token() {
        let err = parse_topology_strict("c0->s0, c9->s0, nonsense", 1, 1).unwrap_err();
        assert_eq!(
            err,
            TopologyParseError::IndexOutOfRange {
                token: "c9->s0".to_owned(),
                index: 9,
                count: 1,
            }
        );

        let err = parse_topology_strict("c0-s0", 1, 1).unwrap_err();
        assert!(matches!(err, TopologyParseError::MissingArrow { .. }));

        let err = parse_topology_strict("x0->s0", 1, 1).unwrap_err();
        assert!(matches!(
            err,
            TopologyParseError::InvalidEndpoint { ref endpoint, .. } if endpoint == "x0"
        ));
    }

    #[test]
    fn strict_mode_matches_permissive_on_valid_input() {
        let spec = "*->s1, c0->*, c1->s0";
        assert_eq!(
            parse_topology_strict(spec, 2, 2).unwrap(),
            parse_topology(spec, 2, 2)
        );
        assert_eq!(
            TopologyParser::default().parse("bogus", 1, 1).unwrap(),
            Vec::new()
        );
        assert!(TopologyParser::strict().parse("bogus", 1, 1).is_err());
    }
}
