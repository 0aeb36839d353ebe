//! Voter responses, and how they add up to an overall result for a choice
//!
//! Votes are stored as integers in 0..=100. They are read back as one of five [`Response`] levels,
//! using [`RESPONSE_THRESHOLDS`]: a stored value belongs to the first level whose threshold it
//! does not exceed.

/// Upper bound (inclusive) of each response level
pub const RESPONSE_THRESHOLDS: [i64; 5] = [-1, 39, 79, 89, 100];

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Response {
    None,
    No,
    Maybe,
    Ok,
    Best,
}

impl Response {
    pub const ALL: [Response; 5] = [Response::None, Response::No, Response::Maybe, Response::Ok, Response::Best];

    pub fn level(self) -> usize {
        self as usize
    }

    pub fn from_level(level: usize) -> Option<Self> {
        Self::ALL.get(level).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            Response::None => "No response",
            Response::No => "No",
            Response::Maybe => "Maybe",
            Response::Ok => "Ok",
            Response::Best => "Best",
        }
    }

    /// Read a stored vote. A missing vote is `None`, values above 100 are `Best`
    pub fn normalise(raw: Option<i64>) -> Self {
        let raw = match raw {
            None => return Response::None,
            Some(raw) => raw,
        };
        RESPONSE_THRESHOLDS.iter()
            .position(|threshold| raw <= *threshold)
            .and_then(Self::from_level)
            .unwrap_or(Response::Best)
    }

    /// The value stored for this level: one more than the previous level's threshold.
    /// `None` means "no vote" and has no stored value.
    pub fn unnormalise(self) -> Option<i64> {
        match self.level() {
            0 => None,
            level => Some(RESPONSE_THRESHOLDS[level - 1] + 1),
        }
    }
}

/// How many voters gave each response to one choice
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    responses: [usize; 5],
    num_responses: usize,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_responses<I: IntoIterator<Item = Response>>(responses: I) -> Self {
        let mut tally = Self::new();
        for response in responses {
            tally.record(response);
        }
        tally
    }

    /// Count one voter's response. Voters who did not answer are counted apart, and do not
    /// add to `num_responses`
    pub fn record(&mut self, response: Response) {
        self.responses[response.level()] += 1;
        if response != Response::None {
            self.num_responses += 1;
        }
    }

    pub fn count(&self, response: Response) -> usize {
        self.responses[response.level()]
    }

    pub fn num_responses(&self) -> usize { self.num_responses }

    /// The overall verdict. Rules are applied in order, the first one that matches wins:
    ///
    /// 1. one voter or fewer: `None`
    /// 2. strictly more than half said No: `No`
    /// 3. everybody said Best: `Best`
    /// 4. at least one Best, and everybody else said Ok: `Best`
    /// 5. everybody said Ok: `Ok`
    /// 6. `Maybe`
    pub fn overall(&self) -> Response {
        let num = self.num_responses;
        let no = self.count(Response::No);
        let ok = self.count(Response::Ok);
        let best = self.count(Response::Best);

        if num <= 1 {
            Response::None
        } else if 2 * no > num {
            Response::No
        } else if num == best {
            Response::Best
        } else if best > 0 && num == ok + best {
            Response::Best
        } else if num == ok {
            Response::Ok
        } else {
            Response::Maybe
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn tally(counts: [usize; 5]) -> Tally {
        let responses = Response::ALL.iter()
            .zip(counts.iter())
            .flat_map(|(response, count)| std::iter::repeat(*response).take(*count));
        Tally::from_responses(responses)
    }

    #[test]
    fn normalise() {
        assert_eq!(Response::normalise(Some(45)), Response::Maybe);
        assert_eq!(Response::normalise(Some(95)), Response::Best);
        assert_eq!(Response::normalise(None), Response::None);
        assert_eq!(Response::normalise(Some(150)), Response::Best);
        assert_eq!(Response::normalise(Some(0)), Response::No);
        assert_eq!(Response::normalise(Some(-3)), Response::None);
        assert_eq!(Response::normalise(Some(80)), Response::Ok);
    }

    #[test]
    fn unnormalise_stays_in_its_bucket() {
        for response in Response::ALL.iter().skip(1) {
            let stored = response.unnormalise().unwrap();
            assert_eq!(Response::normalise(Some(stored)), *response);
        }
        assert_eq!(Response::None.unnormalise(), None);
        assert_eq!(Response::Maybe.unnormalise(), Some(40));
        assert_eq!(Response::Best.unnormalise(), Some(90));
    }

    #[test]
    fn every_stored_value_keeps_its_bucket() {
        for raw in 0..=100 {
            let level = Response::normalise(Some(raw));
            assert_eq!(Response::normalise(level.unnormalise()), level, "stored value {}", raw);
        }
    }

    #[test]
    fn overall_results() {
        assert_eq!(tally([0, 0, 0, 0, 4]).overall(), Response::Best);
        assert_eq!(tally([0, 0, 0, 2, 2]).overall(), Response::Best);
        assert_eq!(tally([0, 3, 0, 1, 0]).overall(), Response::No);
        assert_eq!(tally([0, 0, 0, 3, 0]).overall(), Response::Ok);
        assert_eq!(tally([0, 1, 1, 1, 1]).overall(), Response::Maybe);
        assert_eq!(tally([0, 0, 0, 0, 1]).overall(), Response::None);
        assert_eq!(tally([0, 0, 0, 0, 0]).overall(), Response::None);
        // Exactly half is not a majority
        assert_eq!(tally([0, 2, 0, 2, 0]).overall(), Response::Maybe);
        // Voters who did not answer are left out of the total
        assert_eq!(tally([1, 0, 0, 1, 1]).overall(), Response::Best);
        assert_eq!(tally([2, 0, 0, 0, 1]).overall(), Response::None);
        assert_eq!(tally([2, 0, 0, 0, 1]).count(Response::None), 2);
        assert_eq!(tally([2, 0, 0, 0, 1]).num_responses(), 1);
        assert_eq!(tally([3, 2, 0, 1, 0]).overall(), Response::No);
    }
}
