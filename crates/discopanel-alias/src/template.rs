use crate::context::Context;

/// Bounded iteration count for fixpoint resolution (§4.8): substitution is
/// applied repeatedly so a resolved value can itself contain tokens, up to
/// this many passes.
pub const MAX_DEPTH: usize = 8;

/// Expands every `{{path.to.field}}` token in `template` against `ctx`,
/// repeating until a fixpoint (no change between passes) or `MAX_DEPTH`
/// passes, whichever comes first. Unknown paths expand to the empty string.
pub fn substitute(template: &str, ctx: &Context) -> String {
    let mut current = template.to_owned();
    for _ in 0..MAX_DEPTH {
        let next = substitute_once(&current, ctx);
        if next == current {
            return next;
        }
        current = next;
    }
    current
}

fn substitute_once(template: &str, ctx: &Context) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + 2..];
        match after_open.find("}}") {
            Some(end) => {
                let path = after_open[..end].trim();
                out.push_str(&ctx.resolve(path).unwrap_or_default());
                rest = &after_open[end + 2..];
            }
            None => {
                // No closing delimiter: treat the rest as literal text.
                out.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use discopanel_types::{Loader, RuntimeOverrides, Server, ServerStatus};
    use std::collections::HashMap;

    fn ctx() -> Context {
        let server = Server {
            id: "s1".into(),
            display_name: "Survival".into(),
            loader: Loader::Vanilla,
            game_version: "1.20.1".into(),
            memory_mb: 2048,
            max_players: 20,
            external_port: 25565,
            additional_ports: vec![],
            image: "itzg/minecraft-server:latest".into(),
            container_id: String::new(),
            status: ServerStatus::Running,
            last_started_at: None,
            data_dir: "/data/servers/s1".into(),
            virtual_host: None,
            listener_id: None,
            autostart: false,
            detached: false,
            overrides: RuntimeOverrides::default(),
        };
        Context::new(&server, &HashMap::new())
    }

    #[test]
    fn substitutes_a_single_token() {
        assert_eq!(substitute("name={{server.display_name}}", &ctx()), "name=Survival");
    }

    #[test]
    fn unknown_token_becomes_empty_string() {
        assert_eq!(substitute("[{{server.nonexistent}}]", &ctx()), "[]");
    }

    #[test]
    fn unterminated_token_is_left_literal() {
        assert_eq!(substitute("broken {{server.display_name", &ctx()), "broken {{server.display_name");
    }

    #[test]
    fn text_without_tokens_is_unchanged() {
        assert_eq!(substitute("plain text, no tokens here", &ctx()), "plain text, no tokens here");
    }

    #[test]
    fn multiple_tokens_in_one_template() {
        assert_eq!(
            substitute("{{server.display_name}} runs {{server.game_version}}", &ctx()),
            "Survival runs 1.20.1"
        );
    }
}
