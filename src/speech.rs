// ============================================
// src/speech.rs
// 単語の発音（OS の読み上げコマンドを呼ぶだけ）
// ============================================

use std::io::Write;
use std::process::{Command, Stdio};
use std::thread;

use tracing::debug;

/// 読み上げ設定
#[derive(Debug, Clone)]
pub struct SpeechConfig {
    /// 言語コード
    pub language: String,
    /// 読み上げ速度（1.0 が標準）
    pub rate: f32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            rate: 0.9, // 少しゆっくり
        }
    }
}

impl SpeechConfig {
    /// プラットフォームごとの読み上げコマンド候補（先頭から試す）
    /// 読み上げる文字列は引数に載せず、標準入力で渡す
    fn commands(&self) -> Vec<Command> {
        let mut commands = Vec::new();

        if cfg!(target_os = "macos") {
            // say の既定は約 175 語/分
            let wpm = (175.0 * self.rate).round() as u32;
            let mut say = Command::new("say");
            say.args(["-r", &wpm.to_string(), "-f", "-"]);
            commands.push(say);
        } else if cfg!(target_os = "windows") {
            // SAPI の Rate は -10..10
            let rate = ((self.rate - 1.0) * 10.0).round().clamp(-10.0, 10.0) as i32;
            let script = format!(
                "Add-Type -AssemblyName System.Speech; \
                 $s = New-Object System.Speech.Synthesis.SpeechSynthesizer; \
                 $s.Rate = {rate}; $s.Speak([Console]::In.ReadToEnd())"
            );
            let mut ps = Command::new("powershell");
            ps.args(["-NoProfile", "-Command", &script]);
            commands.push(ps);
        } else {
            let wpm = (175.0 * self.rate).round() as u32;
            let voice = self.language.to_lowercase();
            for program in ["espeak-ng", "espeak"] {
                let mut espeak = Command::new(program);
                espeak.args(["-v", &voice, "-s", &wpm.to_string(), "--stdin"]);
                commands.push(espeak);
            }
        }
        commands
    }
}

/// 単語を読み上げる。結果は待たず、失敗してもログに残すだけ
pub fn speak(text: &str, config: &SpeechConfig) {
    if text.trim().is_empty() {
        return;
    }
    for mut command in config.commands() {
        let spawned = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(mut child) => {
                debug!(word = text, program = ?command.get_program(), "speaking");
                let input = child.stdin.take();
                let text = text.to_string();
                // 書き込みと終了待ちは別スレッドで（ゾンビ化を防ぐ）
                thread::spawn(move || {
                    if let Some(mut stdin) = input {
                        if let Err(err) = writeln!(stdin, "{text}") {
                            debug!(error = %err, "failed to pass word to speech command");
                        }
                        // ここで閉じて EOF を伝える
                    }
                    let _ = child.wait();
                });
                return;
            }
            Err(err) => {
                debug!(program = ?command.get_program(), error = %err, "speech command unavailable");
            }
        }
    }
}
