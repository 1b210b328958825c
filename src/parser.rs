use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_until},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map, map_res, opt, value},
    sequence::{delimited, tuple},
    IResult,
};

use crate::model::Timeframe;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ReportRequest {
    Admissions(Timeframe),
    Discharges(Timeframe),
    Rooms,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Command {
    Admit { name: String, age: u32, diagnosis: String, room: u32 },
    List,
    Count,
    Find { id: u32 },
    Discharge { id: u32 },
    Backup,
    Restore,
    Report(ReportRequest),
    Help,
    Exit,
}

// --- BASIC PARSERS ---

fn parse_u32(input: &str) -> IResult<&str, u32> {
    map_res(digit1, |s: &str| s.parse::<u32>())(input)
}

fn parse_quoted_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let (input, content) = take_until("\"")(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, content.to_string()))
}

fn parse_timeframe(input: &str) -> IResult<&str, Timeframe> {
    alt((
        value(Timeframe::Daily, alt((tag_ci("DAILY"), tag_ci("DAY")))),
        value(Timeframe::Weekly, alt((tag_ci("WEEKLY"), tag_ci("WEEK")))),
        value(Timeframe::Monthly, alt((tag_ci("MONTHLY"), tag_ci("MONTH")))),
    ))(input)
}

// --- HELPERS ---
fn ws<'a, F, O, E: nom::error::ParseError<&'a str>>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O, E>
where F: FnMut(&'a str) -> IResult<&'a str, O, E> {
    delimited(multispace0, inner, multispace0)
}

fn tag_ci(t: &'static str) -> impl FnMut(&str) -> IResult<&str, &str> {
    move |input| tag_no_case(t)(input)
}

// --- COMMAND PARSERS ---

/// `ADMIT "name", age, "diagnosis", room` (parentheses optional)
fn parse_admit(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("ADMIT")(input)?;
    let (input, open) = opt(ws(char('(')))(input)?;
    let (input, _) = multispace0(input)?;
    let (input, name) = parse_quoted_string(input)?;
    let (input, _) = ws(char(','))(input)?;
    let (input, age) = parse_u32(input)?;
    let (input, _) = ws(char(','))(input)?;
    let (input, diagnosis) = parse_quoted_string(input)?;
    let (input, _) = ws(char(','))(input)?;
    let (input, _) = opt(tuple((tag_ci("ROOM"), multispace1)))(input)?;
    let (input, room) = parse_u32(input)?;
    let (input, _) = if open.is_some() { ws(char(')'))(input)? } else { (input, ')') };
    Ok((input, Command::Admit { name, age, diagnosis, room }))
}

fn parse_find(input: &str) -> IResult<&str, Command> {
    let (input, _) = alt((tag_ci("FIND"), tag_ci("GET")))(input)?;
    let (input, _) = multispace1(input)?;
    let (input, id) = parse_u32(input)?;
    Ok((input, Command::Find { id }))
}

fn parse_discharge(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("DISCHARGE")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, id) = parse_u32(input)?;
    Ok((input, Command::Discharge { id }))
}

/// `REPORT ADMISSIONS <tf>`, `REPORT DISCHARGES <tf>`, `REPORT ROOMS`
fn parse_report(input: &str) -> IResult<&str, Command> {
    let (input, _) = tag_ci("REPORT")(input)?;
    let (input, _) = multispace1(input)?;
    let (input, request) = alt((
        map(
            tuple((alt((tag_ci("ADMISSIONS"), tag_ci("ADMITTED"))), multispace1, parse_timeframe)),
            |(_, _, tf)| ReportRequest::Admissions(tf),
        ),
        map(
            tuple((alt((tag_ci("DISCHARGES"), tag_ci("DISCHARGED"))), multispace1, parse_timeframe)),
            |(_, _, tf)| ReportRequest::Discharges(tf),
        ),
        value(ReportRequest::Rooms, alt((tag_ci("ROOMS"), tag_ci("ROOM")))),
    ))(input)?;
    Ok((input, Command::Report(request)))
}

fn parse_keyword(input: &str) -> IResult<&str, Command> {
    alt((
        value(Command::List, alt((tag_ci("LIST"), tag_ci("VIEW")))),
        value(Command::Count, tag_ci("COUNT")),
        value(Command::Backup, alt((tag_ci("BACKUP"), tag_ci("SAVE")))),
        value(Command::Restore, alt((tag_ci("RESTORE"), tag_ci("RELOAD")))),
        value(Command::Help, tag_ci("HELP")),
        value(Command::Exit, alt((tag_ci("EXIT"), tag_ci("QUIT")))),
    ))(input)
}

pub fn parse_command(input: &str) -> Result<Command, String> {
    let input = input.trim();
    let result = alt((
        parse_admit,
        parse_find,
        parse_discharge,
        parse_report,
        parse_keyword,
    ))(input);

    match result {
        Ok((remainder, cmd)) => {
            if !remainder.trim().is_empty() {
                return Err(format!("Unexpected tokens at end: '{}'", remainder));
            }
            Ok(cmd)
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let context: String = if e.input.chars().count() > 20 {
                format!("{}...", e.input.chars().take(20).collect::<String>())
            } else {
                e.input.to_string()
            };
            Err(format!("Invalid syntax near: '{}'", context))
        },
        Err(nom::Err::Incomplete(_)) => Err("Incomplete command.".to_string()),
    }
}
