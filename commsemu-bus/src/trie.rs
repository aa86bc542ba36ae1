use rustc_hash::FxHashMap;

/// Separator between topic segments.
pub const SEPARATOR: char = '/';
/// Matches exactly one segment.
pub const SINGLE_WILDCARD: &str = "*";
/// Matches one or more trailing segments. Only valid as the last segment.
pub const TAIL_WILDCARD: &str = ">";

/// A node in the prefix trie.
#[derive(Debug)]
struct Node<V> {
    children: FxHashMap<String, Node<V>>,
    value: Option<V>,
}

impl<V> Node<V> {
    fn new() -> Self {
        Self { children: FxHashMap::default(), value: None }
    }
}

/// Returns `true` if `pattern` is a valid topic pattern: non-empty, and with [`TAIL_WILDCARD`]
/// only in the last position.
pub fn is_valid_pattern(pattern: &str) -> bool {
    if pattern.is_empty() {
        return false;
    }
    let mut tokens = pattern.split(SEPARATOR).peekable();
    while let Some(token) = tokens.next() {
        if token == TAIL_WILDCARD && tokens.peek().is_some() {
            return false;
        }
    }
    true
}

/// A prefix trie mapping topic patterns to values.
///
/// Patterns are `/`-separated and support wildcards:
/// - `*` matches a single segment: `/a/*/c` matches `/a/b/c` but not `/a/b/b/c`.
/// - `>` matches one or more trailing segments: `/a/>` matches `/a/b` and `/a/b/c`.
#[derive(Debug)]
pub(crate) struct PrefixTrie<V> {
    root: Node<V>,
}

impl<V> Default for PrefixTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PrefixTrie<V> {
    /// Creates a new, empty prefix trie.
    pub(crate) fn new() -> Self {
        Self { root: Node::new() }
    }

    /// Insert a pattern. Gives the value back if the pattern is already present.
    pub(crate) fn insert(&mut self, pattern: &str, value: V) -> Result<(), V> {
        let mut node = &mut self.root;
        for token in pattern.split(SEPARATOR) {
            node = node.children.entry(token.to_string()).or_insert_with(Node::new);
            if token == TAIL_WILDCARD {
                break;
            }
        }

        if node.value.is_some() {
            return Err(value);
        }
        node.value = Some(value);
        Ok(())
    }

    /// All values whose pattern matches the literal `topic`.
    ///
    /// Wildcard characters in `topic` are not treated as literals and only match wildcard
    /// patterns.
    pub(crate) fn matches(&self, topic: &str) -> Vec<&V> {
        let tokens: Vec<&str> = topic.split(SEPARATOR).collect();
        let mut out = Vec::new();
        Self::collect(&self.root, &tokens, &mut out);
        out
    }

    fn collect<'a>(node: &'a Node<V>, tokens: &[&str], out: &mut Vec<&'a V>) {
        if !tokens.is_empty() {
            if let Some(value) = node.children.get(TAIL_WILDCARD).and_then(|n| n.value.as_ref()) {
                out.push(value);
            }
        }

        match tokens.split_first() {
            None => {
                if let Some(value) = node.value.as_ref() {
                    out.push(value);
                }
            }
            Some((head, rest)) => {
                if *head != SINGLE_WILDCARD && *head != TAIL_WILDCARD {
                    if let Some(child) = node.children.get(*head) {
                        Self::collect(child, rest, out);
                    }
                }
                if let Some(child) = node.children.get(SINGLE_WILDCARD) {
                    Self::collect(child, rest, out);
                }
            }
        }
    }

    pub(crate) fn contains(&self, topic: &str) -> bool {
        !self.matches(topic).is_empty()
    }
}
