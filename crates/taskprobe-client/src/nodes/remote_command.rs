pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// A shell command line for a remote `sh -c`, with every argument quoted.
#[derive(Debug, Clone)]
pub struct RemoteCommand {
    parts: Vec<String>,
}

impl RemoteCommand {
    pub fn new(program: &str) -> Self {
        Self {
            parts: vec![program.to_string()],
        }
    }

    pub fn arg(mut self, arg: &str) -> Self {
        self.parts.push(shell_quote(arg));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.parts
            .extend(args.into_iter().map(|a| shell_quote(a.as_ref())));
        self
    }

    pub fn otherwise(self, fallback: RemoteCommand) -> Self {
        self.join("||", fallback)
    }

    fn join(mut self, op: &str, other: RemoteCommand) -> Self {
        self.parts.push(op.to_string());
        self.parts.extend(other.parts);
        self
    }

    pub fn to_shell_string(&self) -> String {
        self.parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_are_quoted() {
        let cmd = RemoteCommand::new("find").arg("/data/1/mapred local").arg("-mindepth");
        assert_eq!(cmd.to_shell_string(), "find '/data/1/mapred local' '-mindepth'");
    }

    #[test]
    fn test_single_quotes_are_escaped() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn test_otherwise() {
        let cmd = RemoteCommand::new("test")
            .args(["!", "-e", "/tmp/x"])
            .otherwise(RemoteCommand::new("find").arg("/tmp/x"));
        assert_eq!(
            cmd.to_shell_string(),
            "test '!' '-e' '/tmp/x' || find '/tmp/x'"
        );
    }
}
