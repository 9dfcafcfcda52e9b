//! 终端命令解析
//!
//! 考生在终端里输入的一行命令 → `ConsoleCommand`。
//! 题号和选项号对考生都从 1 开始，进入会话前换算成下标。

use crate::environment::EnvSignal;
use crate::models::question::MAX_OPTIONS;
use crate::models::{Answer, Question, QuestionKind};
use crate::session::Navigation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Login { name: String, email: String },
    Start,
    /// `question` 为 0 起的下标，`value` 为原始输入
    Answer { question: usize, value: String },
    Navigate(Navigation),
    Submit,
    Continue,
    Exit,
    Status,
    Help,
    /// 脱机模式下模拟环境信号
    Simulate(EnvSignal),
}

pub const HELP: &str = "\
命令:
  login <姓名> <邮箱>   确认身份
  start                 开始考试（进入全屏）
  answer <题号> <答案>  作答，选择题可填选项号或字母
  next | prev | goto <题号>
  submit                交卷（需全部作答）
  continue | exit       中断后继续考试 / 结束并交卷
  status                查看状态
  hide | show | fs-exit | fs-enter | close   模拟环境信号（脱机模式）";

/// 解析一行输入
pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let line = line.trim();
    let (head, rest) = match line.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (line, ""),
    };

    match head.to_lowercase().as_str() {
        "login" => {
            // 邮箱是最后一个词，前面都是姓名
            let (name, email) = rest
                .rsplit_once(char::is_whitespace)
                .ok_or_else(|| "用法: login <姓名> <邮箱>".to_string())?;
            Ok(ConsoleCommand::Login {
                name: name.trim().to_string(),
                email: email.trim().to_string(),
            })
        }
        "start" => Ok(ConsoleCommand::Start),
        "answer" | "a" => {
            let (number, value) = rest
                .split_once(char::is_whitespace)
                .ok_or_else(|| "用法: answer <题号> <答案>".to_string())?;
            Ok(ConsoleCommand::Answer {
                question: parse_number(number)?,
                value: value.trim().to_string(),
            })
        }
        "next" | "n" => Ok(ConsoleCommand::Navigate(Navigation::Next)),
        "prev" | "p" => Ok(ConsoleCommand::Navigate(Navigation::Prev)),
        "goto" | "g" => Ok(ConsoleCommand::Navigate(Navigation::Goto(parse_number(rest)?))),
        "submit" => Ok(ConsoleCommand::Submit),
        "continue" => Ok(ConsoleCommand::Continue),
        "exit" | "quit" => Ok(ConsoleCommand::Exit),
        "status" | "s" => Ok(ConsoleCommand::Status),
        "help" | "?" => Ok(ConsoleCommand::Help),
        "hide" => Ok(ConsoleCommand::Simulate(EnvSignal::Visibility { hidden: true })),
        "show" => Ok(ConsoleCommand::Simulate(EnvSignal::Visibility { hidden: false })),
        "fs-exit" => Ok(ConsoleCommand::Simulate(EnvSignal::Fullscreen { active: false })),
        "fs-enter" => Ok(ConsoleCommand::Simulate(EnvSignal::Fullscreen { active: true })),
        "close" => Ok(ConsoleCommand::Simulate(EnvSignal::Unload)),
        "" => Err("请输入命令，help 查看帮助".to_string()),
        other => Err(format!("未知命令: {}，help 查看帮助", other)),
    }
}

/// 1 起的编号 → 0 起的下标
fn parse_number(raw: &str) -> Result<usize, String> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("编号必须是从 1 开始的整数: {}", raw.trim())),
    }
}

/// 按题型把原始输入转换为答案
pub fn to_answer(question: &Question, raw: &str) -> Result<Answer, String> {
    let raw = raw.trim();
    match question.kind {
        QuestionKind::MultipleChoice => {
            let mut chars = raw.chars();
            let index = match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii_alphabetic() => {
                    u32::from(c.to_ascii_uppercase()) as usize - u32::from('A') as usize
                }
                _ => parse_number(raw)?,
            };
            Ok(Answer::Choice(index))
        }
        QuestionKind::FillBlank | QuestionKind::Subjective => Ok(Answer::Text(raw.to_string())),
    }
}

/// 选项下标对应的字母，超出 A-Z 时用 `?`
fn option_letter(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .filter(|&i| usize::from(i) < MAX_OPTIONS)
        .map(|i| char::from(b'A' + i))
        .unwrap_or('?')
}

/// 题目展示文本
pub fn render_question(index: usize, question: &Question, current: &Answer) -> String {
    let mut text = format!(
        "第 {} 题 ({} 分) {}",
        index + 1,
        question.points,
        question.prompt
    );
    for (i, option) in question.options.iter().enumerate() {
        let letter = option_letter(i);
        text.push_str(&format!("\n  {}. {}", letter, option));
    }
    if current.is_present() {
        text.push_str(&format!("\n  当前作答: {}", current));
    }
    text
}
