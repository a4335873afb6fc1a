// 端末での対話入力
use std::io::{self, BufRead, Write};

/// 決まった選択肢だけを受け付けるプロンプト
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl Console<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Console::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Console { input, output }
    }

    /// 出力先へ 1 行書く
    pub fn say(&mut self, message: &str) -> io::Result<()> {
        writeln!(self.output, "{}", message)
    }

    /// 入力を 1 行読む。入力が閉じていればエラー
    fn read_token(&mut self, message: &str) -> io::Result<String> {
        write!(self.output, "{}", message)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "入力が終了しました"));
        }
        Ok(line.trim().to_lowercase())
    }

    /// accepted のいずれかが入力されるまで繰り返す
    pub fn choose(&mut self, message: &str, accepted: &[&str]) -> io::Result<String> {
        loop {
            let token = self.read_token(message)?;
            if accepted.contains(&token.as_str()) {
                return Ok(token);
            }
            writeln!(self.output, "無効な入力です。{} のいずれかを入力してください。", accepted.join(" / "))?;
        }
    }

    /// y / n の確認
    pub fn confirm(&mut self, message: &str) -> io::Result<bool> {
        Ok(self.choose(message, &["y", "n"])? == "y")
    }

    /// 0..count の番号を選ばせる
    pub fn choose_index(&mut self, message: &str, count: usize) -> io::Result<usize> {
        loop {
            let token = self.read_token(message)?;
            match token.parse::<usize>() {
                Ok(idx) if idx < count => return Ok(idx),
                _ => writeln!(self.output, "無効な入力です。もう一度入力してください。")?,
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn into_output(self) -> W {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reprompts_until_recognized() {
        let mut console = Console::new(Cursor::new("maybe\n Y \n"), Vec::new());
        assert!(console.confirm("削除(y/n)? ").unwrap());

        let out = String::from_utf8(console.into_output()).unwrap();
        assert!(out.contains("無効な入力です"));
    }

    #[test]
    fn index_must_be_in_range() {
        let mut console = Console::new(Cursor::new("abc\n7\n2\n"), Vec::new());
        assert_eq!(console.choose_index("ID: ", 3).unwrap(), 2);
    }

    #[test]
    fn closed_input_is_an_error() {
        let mut console = Console::new(Cursor::new(""), Vec::new());
        let err = console.confirm("? ").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
